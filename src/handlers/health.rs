use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub store: &'static str,
}

// ─── GET /api/health ─────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthStatus>) {
    let store = state.store.backend();
    if state.store.health_check().await {
        (StatusCode::OK, Json(HealthStatus { status: "ok", store }))
    } else {
        tracing::warn!(store, "Log store health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "unavailable",
                store,
            }),
        )
    }
}
