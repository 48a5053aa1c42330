//! Shared harness for HTTP-level integration tests.
//!
//! Builds the same router the production binary serves, with the
//! in-memory deployment backend so no test touches docker.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use weave_api::config::ServerConfig;
use weave_api::router::build_app_router;
use weave_api::state::AppState;
use weave_deploy::memory::InMemoryTarget;
use weave_fetcher::SpecFetcher;
use weave_orchestrator::Orchestrator;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        step_timeout_secs: 20,
        pass_threshold: 70,
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool and the in-memory deployment backend.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();

    let orchestrator = Arc::new(Orchestrator::new(
        pool.clone(),
        Arc::new(SpecFetcher::new()),
        Arc::new(InMemoryTarget::new()),
        config.orchestrator_config(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator,
    };

    build_app_router(state, &config)
}

pub async fn get(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn post_json(app: Router, path: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn post_empty(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn delete(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method("DELETE")
            .uri(path)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is not valid JSON")
}

/// A well-formed create payload pointing at unreachable local hosts.
pub fn create_payload(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "user_intent": "sync contacts from source to destination",
        "source_discovery": {
            "name": "source-api",
            "base_url": "http://127.0.0.1:1",
            "docs_url": "http://127.0.0.1:1/openapi.json",
            "confidence": 0.9,
            "provenance": "user"
        },
        "dest_discovery": {
            "name": "dest-api",
            "base_url": "http://127.0.0.1:1",
            "docs_url": "http://127.0.0.1:1/openapi.json",
            "confidence": 0.8,
            "provenance": "user"
        }
    })
}
