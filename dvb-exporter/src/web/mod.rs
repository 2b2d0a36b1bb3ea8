//! HTTP server exposing the metrics.

pub mod api;
pub mod dashboard;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::collector::ReadingStore;
use state::WebState;

/// JSON view of the latest readings.
pub const ADAPTERS_PATH: &str = "/api/adapters";

/// Build the router for `web_state`.
pub fn router(web_state: Arc<WebState>) -> Router {
    let telemetry_path = web_state.telemetry_path.clone();
    Router::new()
        .route(&telemetry_path, get(api::get_metrics))
        .route(ADAPTERS_PATH, get(api::get_adapters))
        .route("/", get(dashboard::index))
        .with_state(web_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` completes.
pub async fn start_web_server<F>(
    listen_addr: SocketAddr,
    telemetry_path: &str,
    store: Arc<ReadingStore>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let web_state = Arc::new(WebState::new(store, telemetry_path));
    let app = router(web_state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!(
        "Listening on http://{} (metrics at {})",
        listen_addr,
        telemetry_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use axum::body::{to_bytes, Body};
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use dvb_frontend::TunerId;
    use tower::ServiceExt;

    use crate::collector::Reading;

    fn app(store: Arc<ReadingStore>) -> Router {
        router(Arc::new(WebState::new(store, "/metrics")))
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn populated_store() -> Arc<ReadingStore> {
        let store = Arc::new(ReadingStore::new());
        let mut readings = BTreeMap::new();
        readings.insert(
            TunerId::new(2, 0),
            Reading {
                lock_acquired: true,
                signal_percent: 80,
                snr_percent: 55,
                ber_count: 0,
                delivery_mode: "DVB-T2".to_string(),
            },
        );
        store.publish(readings);
        store
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (status, content_type, body) = get_body(app(populated_store()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/plain; version=0.0.4"));
        assert!(body.contains("dvb_up{version="));
        assert!(body.contains("dvb_signal{adapter=\"2\",frontend=\"0\"} 80"));
        assert!(body.contains("dvb_lock{adapter=\"2\",frontend=\"0\"} 1"));
    }

    #[tokio::test]
    async fn test_metrics_before_first_cycle() {
        let (status, _, body) = get_body(app(Arc::new(ReadingStore::new())), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("dvb_up"));
        assert!(!body.contains("dvb_signal"));
    }

    #[tokio::test]
    async fn test_adapters_endpoint() {
        let (status, _, body) = get_body(app(populated_store()), "/api/adapters").await;
        assert_eq!(status, StatusCode::OK);

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["cycle"], 1);
        let adapter = &value["adapters"][0];
        assert_eq!(adapter["adapter"], 2);
        assert_eq!(adapter["frontend"], 0);
        assert_eq!(adapter["lock_acquired"], true);
        assert_eq!(adapter["signal_percent"], 80);
        assert_eq!(adapter["delivery_mode"], "DVB-T2");
    }

    #[tokio::test]
    async fn test_index_and_custom_telemetry_path() {
        let store = Arc::new(ReadingStore::new());
        let app = router(Arc::new(WebState::new(store, "/dvb")));

        let (status, _, body) = get_body(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/dvb\""));

        let (status, _, _) = get_body(app.clone(), "/dvb").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
