//! Landing page.

use std::sync::Arc;

use axum::{extract::State, response::Html};

use crate::web::state::WebState;

pub async fn index(State(web_state): State<Arc<WebState>>) -> Html<String> {
    Html(render_index(&web_state.telemetry_path))
}

fn render_index(telemetry_path: &str) -> String {
    HTML_CONTENT.replace("{metrics_path}", telemetry_path)
}

const HTML_CONTENT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>DVB metrics exporter</title>
</head>
<body>
    <h1>DVB metrics exporter</h1>
    <p><a href="{metrics_path}">Metrics</a></p>
    <p><a href="/api/adapters">Adapters (JSON)</a></p>
</body>
</html>
"#;
