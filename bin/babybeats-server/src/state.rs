//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use babybeats_core::{CodecRecord, NamingCodec, OllamaClient, TaskManager};

use crate::config::Config;

/// Task manager specialised to baby-name generation.
pub type NameManager = TaskManager<NamingCodec>;

/// Record type stored by [`NameManager`].
pub type NameRecord = CodecRecord<NamingCodec>;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Owns every naming task and its persisted record.
    pub manager: NameManager,
    /// Used by the health check to probe the completion service.
    pub ollama: Arc<OllamaClient>,
}

impl AppState {
    /// Model a new task starts with when the caller names none.
    pub fn default_model(&self) -> Option<String> {
        self.config
            .default_model
            .clone()
            .or_else(|| self.manager.config().default_model().map(str::to_owned))
    }
}
