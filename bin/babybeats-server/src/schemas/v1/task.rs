use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::schemas::v1::names::{NameSuggestionView, NamingRequestView};
use crate::state::NameRecord;

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: String,
    /// `running`, `completed` or `failed`.
    pub status: String,
    pub preferred_model: String,
    pub candidate_models: Vec<String>,
    pub request: NamingRequestView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<NameSuggestionView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl From<&NameRecord> for TaskResponse {
    fn from(record: &NameRecord) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status.to_string(),
            preferred_model: record.preferred_model.clone(),
            candidate_models: record.candidate_models.clone(),
            request: NamingRequestView::from(&record.request),
            result: record
                .result
                .as_ref()
                .map(|names| names.iter().map(NameSuggestionView::from).collect()),
            error: record.error.clone(),
            started_at: record.started_at.to_rfc3339(),
            ended_at: record.ended_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct WaitQuery {
    /// Seconds to wait; capped by the server's configured ceiling.
    pub timeout_secs: Option<u64>,
}
