//! AI task runtime for babybeats.
//!
//! A [`TaskManager`] accepts generation tasks, tries the configured local
//! models one after another through a [`CompletionClient`], strips reasoning
//! markup from replies, validates them with a caller-supplied [`TaskCodec`]
//! and persists every task in a [`KvStore`] so interrupted work resumes after
//! a restart.

pub mod codec;
pub mod config;
mod runtime;

pub use codec::{JsonCodec, NamingCodec, TaskCodec};
pub use config::ManagerConfig;
pub use runtime::client::{
    CompletionClient, CompletionRequest, DEFAULT_OLLAMA_URL, GenerationOptions, OllamaClient,
    complete,
};
pub use runtime::fallback::{FallbackSequencer, Sequenced, candidate_order};
pub use runtime::manager::{CodecRecord, TaskManager};
pub use runtime::sanitize::sanitize;
pub use runtime::storage::{
    DEFAULT_STORE_KEY, FileKvStore, KvStore, MemoryKvStore, StoreError, TaskMap, TaskStore,
};
pub use runtime::types::{
    CANCELLED, CompletionError, ManagerError, ModelAttempt, ModelDescriptor, SequenceError,
    TaskEvent, TaskId, TaskRecord, TaskStatus, new_task_id,
};
