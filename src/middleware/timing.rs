use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Tower-compatible middleware that adds two response headers:
///
///   X-Response-Time-Us: total handler wall time in microseconds
///   Server-Timing:      same value in the standard Server-Timing format
///
/// and emits one tracing event per API request.
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros() as u64;

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing =
        format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // ── Request log ─────────────────────────────────────────────
    // Static assets and the long-lived SSE feed are skipped.
    let status = response.status().as_u16();
    if path.starts_with("/api/") && !path.ends_with("/stream") {
        match status {
            500..=599 => tracing::error!(%method, %path, status, us, "request"),
            400..=499 => tracing::warn!(%method, %path, status, us, "request"),
            _ => tracing::info!(%method, %path, status, us, "request"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn adds_timing_headers() {
        let app = Router::new()
            .route("/api/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn(timing_middleware));

        let response = app
            .oneshot(http::Request::builder().uri("/api/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-Response-Time-Us"));
        let server_timing = response.headers()["Server-Timing"].to_str().unwrap();
        assert!(server_timing.starts_with("total;dur="));
    }
}
