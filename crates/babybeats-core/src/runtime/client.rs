use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::runtime::types::{CompletionError, ModelDescriptor};

/// Default address of a local Ollama instance.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Sampling options forwarded with every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Upper bound on generated tokens (`num_predict` on the wire).
    #[serde(rename = "num_predict")]
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 3000,
            top_p: 0.9,
        }
    }
}

/// What the completion service is asked to do, independent of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub options: GenerationOptions,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

/// A text-completion service bound to model names.
///
/// Implementations perform one raw call. Timeouts and cancellation are
/// applied uniformly by [`complete`], which drops the in-flight future and
/// with it the underlying connection.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, CompletionError>;
}

/// Run one completion against `model`, bounded by its timeout and by the
/// cancel signal.
pub async fn complete(
    client: &dyn CompletionClient,
    model: &ModelDescriptor,
    request: &CompletionRequest,
    cancel: &mut watch::Receiver<bool>,
) -> Result<String, CompletionError> {
    if *cancel.borrow() {
        return Err(CompletionError::Cancelled);
    }

    let call = tokio::time::timeout(model.timeout, client.generate(&model.name, request));
    tokio::select! {
        res = call => match res {
            Ok(inner) => inner,
            Err(_) => {
                warn!(model = %model.name, timeout_ms = model.timeout.as_millis() as u64, "completion timed out; aborting call");
                Err(CompletionError::Timeout { timeout_ms: model.timeout.as_millis() as u64 })
            }
        },
        _ = cancelled(cancel) => {
            debug!(model = %model.name, "completion aborted by cancel signal");
            Err(CompletionError::Cancelled)
        }
    }
}

/// Resolves once the flag is raised. A dropped sender means nobody can
/// cancel any more, so the future then never resolves.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Client for the `/api/generate` endpoint of a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: Option<String>,
}

impl OllamaClient {
    /// `base_url` is the host root, e.g. `"http://localhost:11434"`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("babybeats/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Whether the server answers its model listing endpoint.
    pub async fn probe(&self) -> bool {
        let resp = self.client.get(self.url("/api/tags")).send().await;
        matches!(resp, Ok(r) if r.status().is_success())
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn generate(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, CompletionError> {
        let body = GenerateBody {
            model,
            prompt: &request.prompt,
            stream: false,
            options: &request.options,
        };

        debug!(model, prompt_len = request.prompt.len(), "sending generate request");
        let resp = self
            .client
            .post(self.url("/api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::TransportError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(model, status = status.as_u16(), "generate request rejected");
            return Err(CompletionError::ServiceError {
                status: status.as_u16(),
            });
        }

        let reply: GenerateReply = resp.json().await.map_err(|e| {
            if e.is_decode() {
                CompletionError::InvalidResponse(e.to_string())
            } else {
                CompletionError::TransportError(e.to_string())
            }
        })?;

        match reply.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(CompletionError::EmptyResponse),
            None => Err(CompletionError::InvalidResponse(
                "missing `response` field".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest::new("name the baby", GenerationOptions::default())
    }

    fn no_cancel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn generate_returns_response_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "qwen3:32b",
                "prompt": "name the baby",
                "stream": false,
                "options": { "num_predict": 3000 }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "[{\"name\":\"A\"}]" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri());
        let text = client.generate("qwen3:32b", &request()).await.expect("generate");
        assert_eq!(text, "[{\"name\":\"A\"}]");
    }

    #[tokio::test]
    async fn non_success_status_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri());
        let err = client.generate("m", &request()).await.unwrap_err();
        assert_eq!(err, CompletionError::ServiceError { status: 503 });
    }

    #[tokio::test]
    async fn missing_response_field_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "done": true })),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri());
        let err = client.generate("m", &request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn blank_response_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "response": "  \n" })),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri());
        let err = client.generate("m", &request()).await.unwrap_err();
        assert_eq!(err, CompletionError::EmptyResponse);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        // Port 1 is reserved and never has a listener in test environments.
        let client = OllamaClient::new("http://127.0.0.1:1");
        let err = client.generate("m", &request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::TransportError(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn complete_times_out_slow_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "late" }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri());
        let model = ModelDescriptor::new("slow", Duration::from_millis(100));
        let (_tx, mut rx) = no_cancel();
        let err = complete(&client, &model, &request(), &mut rx)
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::Timeout { timeout_ms: 100 });
    }

    #[tokio::test]
    async fn complete_observes_cancel_signal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "late" }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri());
        let model = ModelDescriptor::new("slow", Duration::from_secs(30));
        let (tx, mut rx) = no_cancel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let err = complete(&client, &model, &request(), &mut rx)
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::Cancelled);
    }

    #[tokio::test]
    async fn probe_reports_reachability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(OllamaClient::new(server.uri()).probe().await);
        assert!(!OllamaClient::new("http://127.0.0.1:1").probe().await);
    }
}
