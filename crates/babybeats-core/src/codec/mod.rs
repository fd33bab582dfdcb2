//! Caller-supplied schemas for task requests and results.
//!
//! The runtime never looks inside a request or result. A [`TaskCodec`] turns
//! the request into a prompt and validates the model's sanitized text into a
//! typed output; a rejected output counts as a failed attempt and the next
//! model is tried.

pub mod naming;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::runtime::client::GenerationOptions;

pub use naming::{Gender, NameSuggestion, NamingCodec, NamingRequest};

pub trait TaskCodec: Send + Sync + 'static {
    type Request: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
    type Output: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    fn render_prompt(&self, request: &Self::Request) -> String;

    /// Validate sanitized model text. `Err` carries a short reason.
    fn decode(&self, text: &str) -> Result<Self::Output, String>;

    /// Sampling options for this kind of task; `None` uses the manager's.
    fn options(&self) -> Option<GenerationOptions> {
        None
    }
}

/// Untyped codec: any JSON request is sent as the prompt (strings verbatim,
/// other values serialized), and the reply must contain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl TaskCodec for JsonCodec {
    type Request = Value;
    type Output = Value;

    fn render_prompt(&self, request: &Value) -> String {
        match request {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn decode(&self, text: &str) -> Result<Value, String> {
        extract_json(text)
    }
}

/// Parse the JSON a model embedded in prose.
///
/// Tries the outermost `[...]` span first, then the whole text, then the
/// outermost `{...}` span.
pub fn extract_json(text: &str) -> Result<Value, String> {
    if let Some(span) = outer_span(text, '[', ']') {
        if let Ok(value) = serde_json::from_str(span) {
            return Ok(value);
        }
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }
    if let Some(span) = outer_span(text, '{', '}') {
        if let Ok(value) = serde_json::from_str(span) {
            return Ok(value);
        }
    }
    Err("no JSON value found in response".to_owned())
}

fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..end + close.len_utf8()])
}
