//! Configuration for the task manager.

use std::time::Duration;

use crate::runtime::client::GenerationOptions;
use crate::runtime::storage::DEFAULT_STORE_KEY;
use crate::runtime::types::ModelDescriptor;

/// Per-attempt budget used by the default catalog (30 minutes; large local
/// models can take that long on consumer hardware).
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Settings for a [`TaskManager`].
///
/// All fields have sensible defaults via [`Default`].
///
/// [`TaskManager`]: crate::runtime::manager::TaskManager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Known models in fallback order. Defaults to the three local models
    /// the app ships with.
    pub models: Vec<ModelDescriptor>,
    /// Budget for a model name missing from `models`.
    pub default_timeout: Duration,
    /// How often [`TaskManager::wait`] re-reads a task.
    ///
    /// [`TaskManager::wait`]: crate::runtime::manager::TaskManager::wait
    pub poll_interval: Duration,
    /// Key the task map is persisted under.
    pub store_key: String,
    /// Sampling options used when the codec does not supply its own.
    pub options: GenerationOptions,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            models: vec![
                ModelDescriptor::new("deepseek-r1:70b", DEFAULT_MODEL_TIMEOUT)
                    .with_description("DeepSeek R1 70B (quality)"),
                ModelDescriptor::new("qwen3:32b", DEFAULT_MODEL_TIMEOUT)
                    .with_description("Qwen3 32B (balanced)"),
                ModelDescriptor::new("llama3.2:latest", DEFAULT_MODEL_TIMEOUT)
                    .with_description("Llama 3.2 (fast)"),
            ],
            default_timeout: DEFAULT_MODEL_TIMEOUT,
            poll_interval: Duration::from_secs(2),
            store_key: DEFAULT_STORE_KEY.to_owned(),
            options: GenerationOptions::default(),
        }
    }
}

impl ManagerConfig {
    /// Names of the configured models in catalog order.
    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }

    /// First catalog entry, used when a caller has no preference.
    pub fn default_model(&self) -> Option<&str> {
        self.models.first().map(|m| m.name.as_str())
    }

    /// Look up a model by name, falling back to `default_timeout` for names
    /// outside the catalog.
    pub fn descriptor(&self, name: &str) -> ModelDescriptor {
        self.models
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .unwrap_or_else(|| ModelDescriptor::new(name, self.default_timeout))
    }

    pub fn resolve(&self, names: &[String]) -> Vec<ModelDescriptor> {
        names.iter().map(|n| self.descriptor(n)).collect()
    }
}
