pub mod health;
pub mod history;
pub mod operations;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

// ─── Shared response body ────────────────────────────────────────

/// Body of every compute endpoint. A failed computation still answers
/// `{"result": 0}`; the failure is only visible in `/api/history`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperationResponse {
    pub result: f64,
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or mistyped request body. Nothing is logged to the store.
    #[error("{0}")]
    BadRequest(String),

    #[error("Store: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(err) => {
                tracing::error!(error = %err, "Log store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error":  self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
