use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a task; stable across restarts.
pub type TaskId = String;

/// Error text recorded on a task that was cancelled by its caller.
pub const CANCELLED: &str = "Cancelled";

/// Generate a fresh random task id for callers that do not bring their own.
pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}

/// Lifecycle state of a task managed by the [`TaskManager`].
///
/// `Running` is the only non-terminal state; no transition leaves
/// `Completed` or `Failed` except removal of the record.
///
/// [`TaskManager`]: crate::runtime::manager::TaskManager
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    /// Blobs written by the browser build used `processing`.
    #[serde(alias = "processing")]
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// One AI generation attempt, as persisted in the task store.
///
/// `result` is populated only in `Completed`, `error` only in `Failed`.
/// Use [`TaskRecord::complete`] and [`TaskRecord::fail`] to transition so
/// both fields and `ended_at` stay consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord<Req, Out> {
    pub id: TaskId,
    pub request: Req,
    pub preferred_model: String,
    /// Fallback models in configured order, recorded so a resumed task
    /// retries the same sequence.
    #[serde(default)]
    pub candidate_models: Vec<String>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Out>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl<Req, Out> TaskRecord<Req, Out> {
    pub fn running(
        id: impl Into<TaskId>,
        request: Req,
        preferred_model: impl Into<String>,
        candidate_models: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            request,
            preferred_model: preferred_model.into(),
            candidate_models,
            status: TaskStatus::Running,
            result: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn complete(&mut self, result: Out) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
        self.ended_at = Some(Utc::now());
    }

    /// Models in trial order: preferred first, then the remaining candidates.
    pub fn model_order(&self) -> Vec<String> {
        crate::runtime::fallback::candidate_order(&self.preferred_model, &self.candidate_models)
    }
}

/// Static description of a model the sequencer may try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    /// Per-attempt budget; the call is dropped once it elapses.
    pub timeout: Duration,
    pub description: Option<String>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            timeout,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Status change broadcast by the manager. Delivery is best-effort: slow
/// subscribers may lag and miss events, so callers still confirm with
/// `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Failure of a single model attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// No reply within the model's budget.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The completion service answered with a non-success status.
    #[error("service returned HTTP {status}")]
    ServiceError { status: u16 },

    /// Connection refused, DNS failure, reset, ...
    #[error("transport error: {0}")]
    TransportError(String),

    /// The reply body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The model answered with blank text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Text was present but nothing remained once reasoning markup was removed.
    #[error("response empty after removing reasoning markup")]
    EmptyAfterSanitize,

    /// The caller's codec refused the sanitized text.
    #[error("output rejected: {0}")]
    Rejected(String),

    #[error("cancelled")]
    Cancelled,
}

/// A failed attempt against one model, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttempt {
    pub model: String,
    pub error: CompletionError,
}

impl std::fmt::Display for ModelAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

fn summarize(attempts: &[ModelAttempt]) -> String {
    if attempts.is_empty() {
        return "no models configured".to_owned();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Terminal failure of a whole fallback sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Every model failed; attempts are in trial order.
    #[error("all models failed: {}", summarize(.attempts))]
    AllModelsFailed { attempts: Vec<ModelAttempt> },

    /// The cancel signal stopped the sequence early.
    #[error("{}", CANCELLED)]
    Cancelled { attempts: Vec<ModelAttempt> },
}

impl SequenceError {
    pub fn attempts(&self) -> &[ModelAttempt] {
        match self {
            SequenceError::AllModelsFailed { attempts } | SequenceError::Cancelled { attempts } => {
                attempts
            }
        }
    }
}

/// Errors returned to callers of the [`TaskManager`].
///
/// [`TaskManager`]: crate::runtime::manager::TaskManager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// A non-terminal task with this id already exists.
    #[error("task already running: {task_id}")]
    AlreadyRunning { task_id: TaskId },

    /// The referenced task does not exist.
    #[error("task not found: {task_id}")]
    NotFound { task_id: TaskId },

    /// A wait reached its ceiling before the task became terminal.
    #[error("task {task_id} still running after {waited_ms}ms")]
    WaitTimeout { task_id: TaskId, waited_ms: u64 },
}
