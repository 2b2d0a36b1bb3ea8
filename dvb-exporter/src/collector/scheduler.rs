//! Periodic collection cycles.
//!
//! # How It Works
//!
//! 1. Every frontend is wrapped in an [`Adapter`] that owns the device and
//!    the last [`Reading`] computed for it
//! 2. Each cycle moves every adapter into its own blocking task and polls it
//! 3. The cycle waits for all tasks, then publishes every reading to the
//!    [`ReadingStore`] in one swap
//! 4. The loop sleeps for what is left of the interval and starts over; a
//!    cycle that overran the interval is followed immediately by the next
//!
//! On shutdown each device is closed exactly once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dvb_frontend::{FrontendDevice, TunerId};
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::watch;

use super::normalizer::Normalizer;
use super::reading::Reading;
use super::store::ReadingStore;

/// Interval used when none (or an unusable one) is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// One frontend and the reading it produced last.
pub struct Adapter {
    id: TunerId,
    path: PathBuf,
    device: Box<dyn FrontendDevice>,
    reading: Reading,
}

impl Adapter {
    pub fn new(id: TunerId, path: PathBuf, device: Box<dyn FrontendDevice>) -> Self {
        Self {
            id,
            path,
            device,
            reading: Reading::default(),
        }
    }

    pub fn id(&self) -> TunerId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn poll(&mut self, normalizer: &Normalizer) {
        normalizer.poll(self.id, self.device.as_ref(), &mut self.reading);
        debug!(
            "{}: collected, lock: {} signal: {}, snr: {}, ber: {}, mode: {}",
            self.id,
            self.reading.lock_acquired,
            self.reading.signal_percent,
            self.reading.snr_percent,
            self.reading.ber_count,
            self.reading.delivery_mode
        );
    }

    fn close(self) {
        match self.device.close() {
            Ok(()) => debug!("closed {}", self.path.display()),
            Err(e) => warn!("Failed to close {}: {}", self.path.display(), e),
        }
    }
}

/// Where the scheduler is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FannedOut,
    Joined,
    Published,
}

/// Drives collection cycles over a fixed set of adapters.
pub struct CollectionScheduler {
    adapters: Vec<Adapter>,
    normalizer: Normalizer,
    interval: Duration,
    store: Arc<ReadingStore>,
    state: CycleState,
}

impl CollectionScheduler {
    pub fn new(
        adapters: Vec<Adapter>,
        normalizer: Normalizer,
        interval: Duration,
        store: Arc<ReadingStore>,
    ) -> Self {
        Self {
            adapters,
            normalizer,
            interval,
            store,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Poll every adapter once and publish the result; returns the cycle number.
    pub async fn run_cycle(&mut self) -> u64 {
        let normalizer = self.normalizer;
        let tasks: Vec<_> = self
            .adapters
            .drain(..)
            .map(|mut adapter| {
                tokio::task::spawn_blocking(move || {
                    adapter.poll(&normalizer);
                    adapter
                })
            })
            .collect();
        self.state = CycleState::FannedOut;

        for result in join_all(tasks).await {
            match result {
                Ok(adapter) => self.adapters.push(adapter),
                // The device went down with the task and is closed on drop.
                Err(e) => error!("Poll task failed, dropping its frontend: {}", e),
            }
        }
        self.state = CycleState::Joined;

        let readings = self
            .adapters
            .iter()
            .map(|adapter| (adapter.id, adapter.reading.clone()))
            .collect();
        let cycle = self.store.publish(readings);
        self.state = CycleState::Published;
        cycle
    }

    /// Run cycles until `shutdown` flips to true or its sender goes away,
    /// then close every device.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Collection scheduler starting: {} frontend(s), interval {:?}, strategy {:?}, snr correction {}",
            self.adapters.len(),
            self.interval,
            self.normalizer.strategy(),
            self.normalizer.snr_correction()
        );

        while !*shutdown.borrow() {
            let started = Instant::now();
            let cycle = self.run_cycle().await;
            debug_assert_eq!(self.state(), CycleState::Published);
            self.state = CycleState::Idle;

            let elapsed = started.elapsed();
            debug!("cycle {} published in {:?}", cycle, elapsed);
            let wait = self.interval.saturating_sub(elapsed);
            if wait.is_zero() {
                debug!("cycle {} overran the {:?} interval", cycle, self.interval);
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.close_all();
    }

    fn close_all(&mut self) {
        info!("Closing {} frontend(s)", self.adapters.len());
        for adapter in self.adapters.drain(..) {
            adapter.close();
        }
    }
}
