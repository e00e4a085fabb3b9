//! Health check handler

use axum::{extract::State, http::StatusCode};
use crate::AppState;

/// Liveness and database reachability in one probe
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.coordinator.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "db error")
        }
    }
}
