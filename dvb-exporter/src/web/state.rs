//! Web server shared state.

use std::sync::Arc;
use std::time::Instant;

use crate::collector::ReadingStore;
use crate::metrics::PrometheusExporter;

/// State shared by every handler.
pub struct WebState {
    pub store: Arc<ReadingStore>,
    pub exporter: PrometheusExporter,
    /// Path the metrics are served under, linked from the landing page.
    pub telemetry_path: String,
    pub started_at: Instant,
}

impl WebState {
    pub fn new(store: Arc<ReadingStore>, telemetry_path: impl Into<String>) -> Self {
        Self {
            store,
            exporter: PrometheusExporter::new(),
            telemetry_path: telemetry_path.into(),
            started_at: Instant::now(),
        }
    }
}
