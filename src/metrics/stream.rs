use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;

use super::{LatencyReport, SystemMetrics};
use crate::handlers::AppError;
use crate::store::LogStore;
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────
/// Aggregates over the whole Log Store at call time.

pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemMetrics>, AppError> {
    let totals = state.store.totals().await?;
    Ok(Json(SystemMetrics::from_totals(totals)))
}

// ─── GET /api/metrics/latency ────────────────────────────────────
/// Execution-time percentiles, overall and per operation.

pub async fn get_latency(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LatencyReport>, AppError> {
    let entries = state.store.history().await?;
    let report = LatencyReport::from_entries(&entries)
        .map_err(|e| AppError::Internal(format!("histogram: {e:?}")))?;
    Ok(Json(report))
}

// ─── GET /api/metrics/stream ─────────────────────────────────────
/// Server-Sent Events endpoint.
/// Recomputes `SystemMetrics` from the store on every tick and pushes it
/// as JSON. A failed read yields an `error` event; the stream stays open.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures_util::stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(state.config.metrics_stream_interval);
    let store = state.store.clone();

    let stream = IntervalStream::new(interval).then(move |_| {
        let store = store.clone();
        async move { Ok::<_, Infallible>(snapshot_event(store.as_ref()).await) }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn snapshot_event(store: &dyn LogStore) -> Event {
    match store.totals().await {
        Ok(totals) => {
            let json = serde_json::to_string(&SystemMetrics::from_totals(totals))
                .unwrap_or_default();
            Event::default().data(json)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Metrics stream read failed");
            Event::default().event("error").data(err.to_string())
        }
    }
}
