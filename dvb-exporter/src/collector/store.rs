//! Published readings, shared between the scheduler and the web server.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use dvb_frontend::TunerId;
use parking_lot::RwLock;

use super::reading::Reading;

/// The readings of one complete collection cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Cycle number; 0 until the first cycle is published.
    pub cycle: u64,
    pub collected_at: Option<DateTime<Local>>,
    pub readings: BTreeMap<TunerId, Reading>,
}

/// Holds the most recently published [`Snapshot`].
///
/// Each cycle publishes a brand-new snapshot and swaps the pointer, so a
/// reader sees one whole cycle or the previous one, never a mix.
#[derive(Debug, Default)]
pub struct ReadingStore {
    current: RwLock<Arc<Snapshot>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published cycle.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the whole mapping; returns the new cycle number.
    pub fn publish(&self, readings: BTreeMap<TunerId, Reading>) -> u64 {
        let mut current = self.current.write();
        let cycle = current.cycle + 1;
        *current = Arc::new(Snapshot {
            cycle,
            collected_at: Some(Local::now()),
            readings,
        });
        cycle
    }
}
