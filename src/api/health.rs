//! Health check endpoints

use crate::domain::SiteSummary;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let sessions_ok = state.sessions.ping().await.is_ok();
    let sites_ok = state.registry.enabled_sites().next().is_some();

    if sessions_ok && sites_ok {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    }
}

/// Registered sites, main domain only
pub async fn sites(State(state): State<AppState>) -> Json<Vec<SiteSummary>> {
    Json(
        state
            .registry
            .all()
            .iter()
            .map(|site| SiteSummary::from(site.as_ref()))
            .collect(),
    )
}
