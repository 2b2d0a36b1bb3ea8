//! Scriptable frontend used by the collector tests.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dvb_frontend::{DeliverySystem, DeviceError, FrontendDevice, FrontendStatus, Statistics};
use parking_lot::Mutex;

/// Every field left at `None` makes the matching query fail.
#[derive(Clone, Default)]
pub struct FakeFrontend {
    pub status: Option<FrontendStatus>,
    pub delivery: Option<DeliverySystem>,
    pub signal: Option<i16>,
    pub snr: Option<u16>,
    pub ber: Option<u32>,
    pub stats: Option<Statistics>,
    pub fail_close: bool,
    pub delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeFrontend {
    pub fn locked(delivery: DeliverySystem, signal: i16, snr: u16, ber: u32) -> Self {
        Self {
            status: Some(FrontendStatus::from_bits(
                FrontendStatus::HAS_SIGNAL
                    | FrontendStatus::HAS_CARRIER
                    | FrontendStatus::HAS_VITERBI
                    | FrontendStatus::HAS_SYNC
                    | FrontendStatus::HAS_LOCK,
            )),
            delivery: Some(delivery),
            signal: Some(signal),
            snr: Some(snr),
            ber: Some(ber),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn answer<T: Clone>(&self, query: &'static str, value: &Option<T>) -> Result<T, DeviceError> {
        self.calls.lock().push(query);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        value.clone().ok_or_else(|| DeviceError::Query {
            query,
            source: io::Error::new(io::ErrorKind::Other, "fake failure"),
        })
    }
}

impl FrontendDevice for FakeFrontend {
    fn read_status(&self) -> Result<FrontendStatus, DeviceError> {
        self.answer("status", &self.status)
    }

    fn delivery_system(&self) -> Result<DeliverySystem, DeviceError> {
        self.answer("delivery_system", &self.delivery)
    }

    fn signal_strength(&self) -> Result<i16, DeviceError> {
        self.answer("signal_strength", &self.signal)
    }

    fn snr(&self) -> Result<u16, DeviceError> {
        self.answer("snr", &self.snr)
    }

    fn ber(&self) -> Result<u32, DeviceError> {
        self.answer("ber", &self.ber)
    }

    fn statistics(&self) -> Result<Statistics, DeviceError> {
        self.answer("statistics", &self.stats)
    }

    fn close(self: Box<Self>) -> Result<(), DeviceError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DeviceError::Close(io::Error::new(io::ErrorKind::Other, "fake close failure")));
        }
        Ok(())
    }
}
