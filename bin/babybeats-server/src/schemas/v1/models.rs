use babybeats_core::ModelDescriptor;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ModelResponse {
    pub name: String,
    /// Budget for one attempt against this model.
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether new tasks start with this model when none is requested.
    pub is_default: bool,
}

impl ModelResponse {
    pub fn new(model: &ModelDescriptor, default_model: Option<&str>) -> Self {
        Self {
            name: model.name.clone(),
            timeout_secs: model.timeout.as_secs(),
            description: model.description.clone(),
            is_default: default_model == Some(model.name.as_str()),
        }
    }
}
