use axum::{extract::State, Json};
use std::sync::Arc;

use crate::store::OperationLogEntry;
use crate::AppState;

use super::AppError;

// ─── GET /api/history ────────────────────────────────────────────
/// Every logged operation, newest first. No paging.

pub async fn get_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OperationLogEntry>>, AppError> {
    let entries = state.store.history().await?;
    Ok(Json(entries))
}
