//! Prometheus /metrics endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::server::AppState;

/// GET /metrics returns Prometheus text exposition format.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (StatusCode::NOT_FOUND, "Metrics not enabled".to_string()),
    }
}
