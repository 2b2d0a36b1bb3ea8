//! Per-frontend signal reading.

use serde::Serialize;

/// Delivery mode shown before a frontend has reported one.
pub const UNKNOWN_MODE: &str = "unknown";

/// Normalized signal quality of one frontend.
///
/// When `lock_acquired` is false the other fields still hold whatever was
/// computed before the lock was lost (or zero values if the frontend never
/// locked). Check the lock before trusting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub lock_acquired: bool,
    /// 0..=100 in the common case; see [`super::normalizer::signal_percent`].
    pub signal_percent: i64,
    /// Percent of the corrected SNR scale.
    pub snr_percent: i64,
    /// Raw bit error counter.
    pub ber_count: u64,
    pub delivery_mode: String,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            lock_acquired: false,
            signal_percent: 0,
            snr_percent: 0,
            ber_count: 0,
            delivery_mode: UNKNOWN_MODE.to_string(),
        }
    }
}
