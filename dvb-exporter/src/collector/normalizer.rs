//! Signal quality normalization.
//!
//! Frontends expose two incompatible status APIs. The legacy (V3) ioctls
//! return a lock bitmask plus 16-bit signal and SNR values whose scaling is
//! driver specific; the property based (V5) API returns typed statistics.
//! [`Normalizer`] turns either into the same [`Reading`].
//!
//! The strategy is picked once at startup:
//! - [`Strategy::V3WithFallback`] polls the V3 ioctls and re-reads signal,
//!   SNR and mode from the V5 statistics when the V3 SNR comes back as zero.
//! - [`Strategy::V5Only`] reads only the V5 statistics. A zero CNR is taken
//!   as "not locked", so a locked frontend with a genuinely zero CNR reports
//!   no lock.
//!
//! A failed query never aborts the poll: it is logged and the field keeps
//! the value from the previous cycle.

use dvb_frontend::{FrontendDevice, Statistics, TunerId};
use log::{debug, error, warn};

use super::reading::{Reading, UNKNOWN_MODE};

const RAW_FULL_SCALE: i64 = dvb_frontend::device::RAW_FULL_SCALE as i64;

/// Above this many percent a V3 signal value is not a 16-bit fraction.
const SIGNAL_FRACTION_LIMIT: i64 = 97;

/// Drivers for this mode already report signal in the 16-bit fraction scale.
const DVB_T2: &str = "DVB-T2";

/// Which frontend API the poll uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    V3WithFallback,
    V5Only,
}

impl Strategy {
    pub fn from_v5_force(force: bool) -> Self {
        if force {
            Strategy::V5Only
        } else {
            Strategy::V3WithFallback
        }
    }
}

/// Converts raw frontend answers into [`Reading`]s.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    strategy: Strategy,
    snr_correction: u32,
    snr_max: i64,
}

impl Normalizer {
    pub fn new(strategy: Strategy, snr_correction: u32) -> Self {
        Self {
            strategy,
            snr_correction,
            snr_max: snr_max(snr_correction),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn snr_correction(&self) -> u32 {
        self.snr_correction
    }

    /// Poll `device` and update `reading` in place.
    pub fn poll(&self, id: TunerId, device: &dyn FrontendDevice, reading: &mut Reading) {
        match self.strategy {
            Strategy::V5Only => self.poll_v5(id, device, reading),
            Strategy::V3WithFallback => self.poll_v3(id, device, reading),
        }
    }

    fn poll_v5(&self, id: TunerId, device: &dyn FrontendDevice, reading: &mut Reading) {
        let mode = read_mode(id, device);
        let stats = match device.statistics() {
            Ok(stats) => stats,
            Err(e) => {
                warn!("{}: failed to get statistics: {}", id, e);
                return;
            }
        };
        let Some((signal, snr)) = self.extract_statistics(&stats) else {
            debug!("{}: statistics carry no signal/CNR samples", id);
            return;
        };

        reading.snr_percent = snr;
        reading.signal_percent = signal;
        reading.delivery_mode = mode;
        if let Some(sample) = stats.pre_error_bit.first() {
            reading.ber_count = sample.counter_value();
        }
        reading.lock_acquired = reading.snr_percent != 0;
    }

    fn poll_v3(&self, id: TunerId, device: &dyn FrontendDevice, reading: &mut Reading) {
        reading.lock_acquired = match device.read_status() {
            Ok(status) => has_lock(&status.to_string()),
            Err(e) => {
                error!("{}: failed to get status: {}", id, e);
                false
            }
        };
        if !reading.lock_acquired {
            debug!("{}: no lock!", id);
            return;
        }

        match device.delivery_system() {
            Ok(system) => reading.delivery_mode = system.name().to_string(),
            Err(e) => error!("{}: failed to get delivery system: {}", id, e),
        }

        match device.signal_strength() {
            Ok(raw) => {
                reading.signal_percent = signal_percent(raw, &reading.delivery_mode, self.snr_correction)
            }
            Err(e) => error!("{}: failed to get signal strength: {}", id, e),
        }

        match device.snr() {
            Ok(raw) => reading.snr_percent = snr_percent(raw, self.snr_max),
            Err(e) => error!("{}: failed to get SNR: {}", id, e),
        }

        match device.ber() {
            Ok(raw) => reading.ber_count = u64::from(raw),
            Err(e) => error!("{}: failed to get BER: {}", id, e),
        }

        if reading.snr_percent == 0 {
            self.fallback_v5(id, device, reading);
        }
    }

    /// A zero V3 SNR is treated as an unreliable driver, not a real zero.
    fn fallback_v5(&self, id: TunerId, device: &dyn FrontendDevice, reading: &mut Reading) {
        let mode = read_mode(id, device);
        let stats = match device.statistics() {
            Ok(stats) => stats,
            Err(e) => {
                debug!("{}: V5 fallback unavailable: {}", id, e);
                return;
            }
        };
        if let Some((signal, snr)) = self.extract_statistics(&stats) {
            debug!("{}: V3 SNR is zero, using V5 statistics", id);
            reading.snr_percent = snr;
            reading.signal_percent = signal;
            reading.delivery_mode = mode;
        }
    }

    /// `(signal, snr)` from the first signal and CNR layers.
    fn extract_statistics(&self, stats: &Statistics) -> Option<(i64, i64)> {
        let cnr = stats.cnr.first()?;
        let signal = stats.signal.first()?;
        Some((
            signal.relative_value(),
            cnr.relative_value().saturating_mul(i64::from(self.snr_correction)),
        ))
    }
}

fn read_mode(id: TunerId, device: &dyn FrontendDevice) -> String {
    match device.delivery_system() {
        Ok(system) => system.name().to_string(),
        Err(e) => {
            debug!("{}: failed to parse delivery system: {}", id, e);
            UNKNOWN_MODE.to_string()
        }
    }
}

/// Whether a status token string (`+signal+carrier+lock`) reports a lock.
pub fn has_lock(status: &str) -> bool {
    status
        .split('+')
        .any(|token| token.trim().to_ascii_lowercase().ends_with("lock"))
}

/// Divisor of the V3 SNR scale for a correction factor.
pub fn snr_max(snr_correction: u32) -> i64 {
    let correction = i64::from(snr_correction);
    if correction > 1 && correction < RAW_FULL_SCALE {
        RAW_FULL_SCALE / correction
    } else {
        RAW_FULL_SCALE
    }
}

pub fn snr_percent(raw: u16, snr_max: i64) -> i64 {
    i64::from(raw) * 100 / snr_max
}

/// Percent of a V3 signal strength reading.
///
/// Values are normally a 16-bit fraction of full scale. Some delivery modes
/// report a small signed quantity instead, which shows up as more than 97%;
/// those are replaced by the magnitude times the correction factor. DVB-T2
/// is always taken as a fraction.
pub fn signal_percent(raw: i16, mode: &str, snr_correction: u32) -> i64 {
    let percent = i64::from(raw as u16) * 100 / RAW_FULL_SCALE;
    if mode == DVB_T2 || percent <= SIGNAL_FRACTION_LIMIT {
        return percent;
    }
    i64::from(raw).abs() * i64::from(snr_correction)
}
