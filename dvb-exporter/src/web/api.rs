//! Metrics and JSON endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::collector::Reading;
use crate::metrics;
use crate::web::state::WebState;

/// One frontend as shown by `/api/adapters`.
#[derive(Debug, Serialize)]
pub struct AdapterView<'a> {
    pub adapter: u32,
    pub frontend: u32,
    #[serde(flatten)]
    pub reading: &'a Reading,
}

/// Prometheus scrape endpoint.
pub async fn get_metrics(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    let snapshot = web_state.store.snapshot();
    (
        StatusCode::OK,
        [(CONTENT_TYPE, metrics::CONTENT_TYPE)],
        web_state.exporter.export(&snapshot),
    )
}

/// Latest readings of every frontend.
pub async fn get_adapters(State(web_state): State<Arc<WebState>>) -> impl IntoResponse {
    let snapshot = web_state.store.snapshot();
    let adapters: Vec<AdapterView<'_>> = snapshot
        .readings
        .iter()
        .map(|(id, reading)| AdapterView {
            adapter: id.adapter,
            frontend: id.frontend,
            reading,
        })
        .collect();

    Json(json!({
        "cycle": snapshot.cycle,
        "collected_at": snapshot.collected_at.map(|at| at.to_rfc3339()),
        "uptime_seconds": web_state.started_at.elapsed().as_secs(),
        "adapters": adapters,
    }))
}
