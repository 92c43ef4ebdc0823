use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::compute::{self, ComputeError};
use crate::store::{NewLogEntry, Operation, OperationStatus};
use crate::AppState;

use super::{AppError, OperationResponse};

// ─── Request types ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerRequest {
    pub base: f64,
    pub exponent: f64,
}

/// Body of both `/api/fibonacci` and `/api/factorial`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRequest {
    pub n: i64,
}

// ─── POST /api/power ─────────────────────────────────────────────

pub async fn power(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PowerRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, AppError> {
    let Json(req) = payload?;
    record_operation(&state, Operation::Power, &req, || {
        compute::power(req.base, req.exponent)
    })
    .await
}

// ─── POST /api/fibonacci ─────────────────────────────────────────

pub async fn fibonacci(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, AppError> {
    let Json(req) = payload?;
    record_operation(&state, Operation::Fibonacci, &req, || compute::fibonacci(req.n)).await
}

// ─── POST /api/factorial ─────────────────────────────────────────

pub async fn factorial(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, AppError> {
    let Json(req) = payload?;
    record_operation(&state, Operation::Factorial, &req, || compute::factorial(req.n)).await
}

// ─── Shared pipeline ─────────────────────────────────────────────

/// Time the computation, write exactly one log entry, answer `{result}`.
///
/// A compute failure becomes `result = 0` with status "error"; only a
/// store failure turns into an error response.
async fn record_operation<R, F>(
    state: &AppState,
    operation: Operation,
    request: &R,
    run: F,
) -> Result<Json<OperationResponse>, AppError>
where
    R: Serialize,
    F: FnOnce() -> Result<f64, ComputeError>,
{
    let inputs = to_inputs(request)?;

    let started = Instant::now();
    let outcome = run();
    let execution_time = started.elapsed().as_millis() as i64;

    let (result, status) = match outcome {
        Ok(value) => (value, OperationStatus::Success),
        Err(err) => {
            let shown = Value::Object(inputs.clone());
            tracing::warn!(%operation, inputs = %shown, error = %err, "Computation failed");
            (0.0, OperationStatus::Error)
        }
    };

    let entry = state
        .store
        .append(NewLogEntry {
            operation,
            inputs,
            result,
            execution_time,
            status,
        })
        .await?;

    tracing::debug!(id = entry.id, %operation, result, execution_time, "Operation recorded");

    Ok(Json(OperationResponse { result }))
}

fn to_inputs<R: Serialize>(request: &R) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AppError::Internal(format!(
            "request did not serialize to an object: {other}"
        ))),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}
