use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes, middleware, and static serving.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.cors_allowed_origins.as_deref());
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        // ── Compute endpoints ───────────────────────────────────
        .route("/api/power", post(handlers::operations::power))
        .route("/api/fibonacci", post(handlers::operations::fibonacci))
        .route("/api/factorial", post(handlers::operations::factorial))
        // ── Log ─────────────────────────────────────────────────
        .route("/api/history", get(handlers::history::get_history))
        // ── Metrics ─────────────────────────────────────────────
        .route("/api/metrics", get(stream::get_metrics))
        .route("/api/metrics/latency", get(stream::get_latency))
        .route("/api/metrics/stream", get(stream::metrics_stream))
        .route("/api/health", get(handlers::health::health))
        // ── Provide shared state to all routes above ────────────
        .with_state(state);

    // ── Dashboard build, with SPA fallback to index.html ────────
    let router = match static_dir {
        Some(dir) => {
            let index = Path::new(&dir).join("index.html");
            router.fallback_service(ServeDir::new(&dir).fallback(ServeFile::new(index)))
        }
        None => router,
    };

    // ── Global middleware (applied bottom-up) ───────────────────
    router
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(cors)
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::store::{SqliteLogStore, StoreConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = SqliteLogStore::new(StoreConfig::in_memory()).await.unwrap();
        let config = ServerConfig {
            static_dir: None,
            ..ServerConfig::default()
        };
        create_router(Arc::new(AppState {
            store: Arc::new(store),
            config,
        }))
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = send(app, request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
        let response = send(app, Request::get(path).body(Body::empty()).unwrap()).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn fibonacci_then_history() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/fibonacci", json!({"n": 10})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": 55.0}));

        let (status, history) = get_json(&app, "/api/history").await;
        assert_eq!(status, StatusCode::OK);
        let first = &history[0];
        assert_eq!(first["operation"], "fibonacci");
        assert_eq!(first["result"], 55.0);
        assert_eq!(first["inputs"], json!({"n": 10}));
        assert_eq!(first["status"], "success");
        assert_eq!(first["id"], 1);
        assert!(first["timestamp"].is_string());
        assert!(first["execution_time"].as_i64().unwrap() >= 0);
    }

    #[tokio::test]
    async fn factorial_and_power_scenarios() {
        let app = app().await;

        let (_, body) = post_json(&app, "/api/factorial", json!({"n": 5})).await;
        assert_eq!(body["result"], 120.0);

        let (_, body) = post_json(&app, "/api/power", json!({"base": 2, "exponent": 10})).await;
        assert_eq!(body["result"], 1024.0);

        let (_, history) = get_json(&app, "/api/history").await;
        assert_eq!(history[0]["operation"], "power");
        assert_eq!(history[0]["inputs"], json!({"base": 2.0, "exponent": 10.0}));
        assert_eq!(history[1]["operation"], "factorial");
    }

    #[tokio::test]
    async fn compute_failure_is_http_200_with_zero() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/factorial", json!({"n": -1})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": 0.0}));

        let (_, history) = get_json(&app, "/api/history").await;
        assert_eq!(history[0]["status"], "error");
        assert_eq!(history[0]["result"], 0.0);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_without_logging() {
        let app = app().await;

        let (status, body) = post_json(&app, "/api/fibonacci", json!({"n": "ten"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, _) = post_json(&app, "/api/power", json!({"base": 2})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(&app, "/api/factorial", json!({"n": 2.5})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Integral inputs only; a float spelling of an integer is not coerced.
        let (status, _) = post_json(&app, "/api/factorial", json!({"n": 5.0})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, history) = get_json(&app, "/api/history").await;
        assert_eq!(history, json!([]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn parallel_posts_are_all_logged_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteLogStore::new(StoreConfig::new(dir.path().join("ops.db")).max_connections(5))
            .await
            .unwrap();
        let app = create_router(Arc::new(AppState {
            store: Arc::new(store),
            config: ServerConfig {
                static_dir: None,
                ..ServerConfig::default()
            },
        }));

        let requests: Vec<_> = (0..200)
            .map(|n| {
                let app = app.clone();
                tokio::spawn(async move {
                    let (path, body) = match n % 3 {
                        0 => ("/api/fibonacci", json!({"n": n})),
                        1 => ("/api/factorial", json!({"n": n % 20})),
                        _ => ("/api/power", json!({"base": 2, "exponent": n % 10})),
                    };
                    post_json(&app, path, body).await.0
                })
            })
            .collect();
        for request in requests {
            assert_eq!(request.await.unwrap(), StatusCode::OK);
        }

        let (_, history) = get_json(&app, "/api/history").await;
        let ids: Vec<i64> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids.len(), 200);
        assert!(ids.windows(2).all(|pair| pair[0] > pair[1]), "{ids:?}");

        let (_, metrics) = get_json(&app, "/api/metrics").await;
        assert_eq!(metrics["total_requests"], 200);
        assert_eq!(metrics["success_rate"], 100.0);
    }

    #[tokio::test]
    async fn empty_store_metrics() {
        let app = app().await;
        let (status, metrics) = get_json(&app, "/api/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            metrics,
            json!({
                "total_requests": 0,
                "average_response_time": 0.0,
                "success_rate": 0.0,
                "operation_counts": {}
            })
        );
    }

    #[tokio::test]
    async fn metrics_track_successes_and_failures() {
        let app = app().await;

        post_json(&app, "/api/fibonacci", json!({"n": 10})).await;
        post_json(&app, "/api/fibonacci", json!({"n": -2})).await;
        post_json(&app, "/api/factorial", json!({"n": 5})).await;
        post_json(&app, "/api/power", json!({"base": 0, "exponent": -1})).await;

        let (_, metrics) = get_json(&app, "/api/metrics").await;
        assert_eq!(metrics["total_requests"], 4);
        let rate = metrics["success_rate"].as_f64().unwrap();
        assert!((rate - 50.0).abs() < 1e-9);
        assert!(metrics["average_response_time"].as_f64().unwrap() >= 0.0);
        assert_eq!(
            metrics["operation_counts"],
            json!({"fibonacci": 2, "factorial": 1, "power": 1})
        );
    }

    #[tokio::test]
    async fn latency_report_groups_operations() {
        let app = app().await;
        post_json(&app, "/api/fibonacci", json!({"n": 3})).await;
        post_json(&app, "/api/power", json!({"base": 3, "exponent": 2})).await;

        let (status, report) = get_json(&app, "/api/metrics/latency").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["overall"]["count"], 2);
        assert_eq!(report["by_operation"]["fibonacci"]["count"], 1);
        assert_eq!(report["by_operation"]["power"]["count"], 1);
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let app = app().await;
        let (status, body) = get_json(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "store": "sqlite"}));
    }

    #[tokio::test]
    async fn restricted_cors_echoes_listed_origin_only() {
        let store = SqliteLogStore::new(StoreConfig::in_memory()).await.unwrap();
        let config = ServerConfig {
            static_dir: None,
            cors_allowed_origins: Some(vec!["http://localhost:5173".to_string()]),
            ..ServerConfig::default()
        };
        let app = create_router(Arc::new(AppState {
            store: Arc::new(store),
            config,
        }));

        let allowed = send(
            &app,
            Request::get("/api/metrics")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );

        let denied = send(
            &app,
            Request::get("/api/metrics")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert!(!denied
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
