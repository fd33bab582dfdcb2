//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - OpenAPI document at `/api-docs/openapi.json`
//! - Health / heartbeat route
//! - `/v1` task routes

pub mod doc;
mod health;
mod v1;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router, middleware};
use tower::ServiceBuilder;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_doc = doc::get_docs();

    Router::new()
        .merge(health::router())
        .nest("/v1", v1::router())
        .route(
            "/api-docs/openapi.json",
            get(move || async move { Json(api_doc) }),
        )
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use babybeats_core::{
        CompletionClient, CompletionError, CompletionRequest, ManagerConfig, MemoryKvStore,
        ModelDescriptor, NamingCodec, OllamaClient, TaskManager,
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::middleware::trace::X_TRACE_ID;

    const NAMES: &str = r#"[{"name":"李沐阳","meaning":"沐浴阳光","type":"男孩"}]"#;

    /// Replies per model name; `None` never answers.
    struct Fake(HashMap<&'static str, Option<&'static str>>);

    #[async_trait]
    impl CompletionClient for Fake {
        async fn generate(
            &self,
            model: &str,
            _request: &CompletionRequest,
        ) -> Result<String, CompletionError> {
            match self.0.get(model) {
                Some(Some(text)) => Ok(text.to_string()),
                Some(None) => std::future::pending().await,
                None => Err(CompletionError::ServiceError { status: 404 }),
            }
        }
    }

    fn app(replies: &[(&'static str, Option<&'static str>)]) -> Router {
        let models = vec![
            ModelDescriptor::new("fast", Duration::from_secs(30)),
            ModelDescriptor::new("slow", Duration::from_secs(30)),
        ];
        let manager = TaskManager::new(
            ManagerConfig {
                models,
                poll_interval: Duration::from_millis(10),
                ..Default::default()
            },
            Arc::new(Fake(replies.iter().copied().collect())),
            NamingCodec,
            Arc::new(MemoryKvStore::new()),
        );
        let mut config = Config::from_env();
        config.wait_ceiling = Duration::from_secs(5);
        config.cors_allowed_origins = None;

        build(Arc::new(AppState {
            config: Arc::new(config),
            manager,
            ollama: Arc::new(OllamaClient::new("http://127.0.0.1:1")),
        }))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok_even_without_ollama() {
        let app = app(&[]);
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ollama"], "unreachable");
    }

    #[tokio::test]
    async fn responses_carry_trace_id() {
        let app = app(&[]);
        let trace_id = "9f0c7a4e-5a1b-4c3d-8e2f-0123456789ab";
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/models")
                    .header(X_TRACE_ID, trace_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_TRACE_ID], trace_id);
    }

    #[tokio::test]
    async fn models_lists_catalog_with_default() {
        let app = app(&[]);
        let (status, body) = call(&app, "GET", "/v1/models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "fast");
        assert_eq!(body[0]["is_default"], true);
        assert_eq!(body[1]["timeout_secs"], 30);
    }

    #[tokio::test]
    async fn naming_task_runs_to_completion() {
        let app = app(&[("fast", Some("<think>hmm</think>")), ("slow", Some(NAMES))]);

        let (status, started) = call(
            &app,
            "POST",
            "/v1/names",
            Some(json!({"id": "n1", "father": "李雷", "mother": "韩梅梅", "gender": "boy"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(started["status"], "running");
        assert_eq!(started["preferred_model"], "fast");

        let (status, done) = call(&app, "GET", "/v1/tasks/n1/wait?timeout_secs=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "completed");
        assert_eq!(done["result"][0]["name"], "李沐阳");
        assert_eq!(done["result"][0]["type"], "男孩");
        assert_eq!(done["request"]["gender"], "boy");

        let (_, list) = call(&app, "GET", "/v1/tasks", None).await;
        assert_eq!(list.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn duplicate_running_id_conflicts() {
        let app = app(&[("fast", None)]);
        let body = json!({"id": "dup", "father": "A", "mother": "B"});

        let (first, _) = call(&app, "POST", "/v1/names", Some(body.clone())).await;
        let (second, err) = call(&app, "POST", "/v1/names", Some(body)).await;
        assert_eq!(first, StatusCode::ACCEPTED);
        assert_eq!(second, StatusCode::CONFLICT);
        assert!(err["error"].as_str().unwrap_or_default().contains("dup"));
    }

    #[tokio::test]
    async fn cancel_then_delete() {
        let app = app(&[("fast", None)]);
        call(
            &app,
            "POST",
            "/v1/names",
            Some(json!({"id": "c1", "father": "A", "mother": "B", "candidates": []})),
        )
        .await;

        let (status, cancelled) = call(&app, "POST", "/v1/tasks/c1/cancel", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "failed");
        assert_eq!(cancelled["error"], "Cancelled");

        let (status, _) = call(&app, "DELETE", "/v1/tasks/c1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", "/v1/tasks/c1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wait_on_hung_task_times_out() {
        let app = app(&[("fast", None)]);
        call(
            &app,
            "POST",
            "/v1/names",
            Some(json!({"id": "h1", "father": "A", "mother": "B"})),
        )
        .await;

        let (status, _) = call(&app, "GET", "/v1/tasks/h1/wait?timeout_secs=0", None).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn invalid_body_is_bad_request() {
        let app = app(&[]);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/names",
            Some(json!({"father": " ", "mother": "B"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let app = app(&[]);
        let (status, doc) = call(&app, "GET", "/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/v1/names"].is_object());
        assert!(doc["paths"]["/v1/tasks/{id}/wait"].is_object());
    }
}
