//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use babybeats_core::config::DEFAULT_MODEL_TIMEOUT;
use babybeats_core::{DEFAULT_OLLAMA_URL, ManagerConfig, ModelDescriptor};

/// Runtime configuration for babybeats-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:3000"`).
    pub bind_address: String,

    /// Root URL of the Ollama instance (default: `"http://localhost:11434"`).
    pub ollama_url: String,

    /// Directory the task store is written to (default: `"./data"`).
    pub data_dir: PathBuf,

    /// Model catalog in fallback order. Empty means the built-in catalog.
    ///
    /// Parsed from `BABYBEATS_MODELS`, e.g. `"qwen3:32b=600,llama3.2:latest"`;
    /// an entry without `=secs` gets the 30 minute default.
    pub models: Vec<ModelDescriptor>,

    /// Model used when a request names none (default: first catalog entry).
    pub default_model: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated allowed origins; unset allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Longest a `/wait` request may block (default: 10 minutes).
    pub wait_ceiling: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_owned());

        Self {
            bind_address: env_or("BABYBEATS_BIND", "127.0.0.1:3000"),
            ollama_url: env_or("BABYBEATS_OLLAMA_URL", DEFAULT_OLLAMA_URL),
            data_dir: PathBuf::from(env_or("BABYBEATS_DATA_DIR", "./data")),
            models: var("BABYBEATS_MODELS")
                .map(|v| parse_models(&v))
                .unwrap_or_default(),
            default_model: var("BABYBEATS_DEFAULT_MODEL").filter(|v| !v.trim().is_empty()),
            log_level: env_or("BABYBEATS_LOG", "info"),
            log_json: var("BABYBEATS_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: var("BABYBEATS_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            wait_ceiling: Duration::from_secs(parse_or(
                var("BABYBEATS_WAIT_CEILING_SECS"),
                600,
            )),
        }
    }

    /// Settings for the task manager derived from this configuration.
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::default();
        if !self.models.is_empty() {
            config.models = self.models.clone();
        }
        config
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Model names contain `:`, so `=` separates the timeout.
fn parse_models(list: &str) -> Vec<ModelDescriptor> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.rsplit_once('=') {
            Some((name, secs)) => ModelDescriptor::new(
                name.trim(),
                secs.trim()
                    .parse()
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_MODEL_TIMEOUT),
            ),
            None => ModelDescriptor::new(entry, DEFAULT_MODEL_TIMEOUT),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]);
        assert_eq!(cfg.bind_address, "127.0.0.1:3000");
        assert_eq!(cfg.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(cfg.wait_ceiling, Duration::from_secs(600));
        assert!(!cfg.log_json);
        assert!(cfg.models.is_empty());
        assert_eq!(
            cfg.manager_config().model_names(),
            ManagerConfig::default().model_names()
        );
    }

    #[test]
    fn model_catalog_from_environment() {
        let cfg = config(&[
            ("BABYBEATS_MODELS", "qwen3:32b=600, llama3.2:latest ,bad=x,"),
            ("BABYBEATS_LOG_JSON", "TRUE"),
        ]);
        assert_eq!(
            cfg.models,
            vec![
                ModelDescriptor::new("qwen3:32b", Duration::from_secs(600)),
                ModelDescriptor::new("llama3.2:latest", DEFAULT_MODEL_TIMEOUT),
                ModelDescriptor::new("bad", DEFAULT_MODEL_TIMEOUT),
            ]
        );
        assert_eq!(cfg.manager_config().default_model(), Some("qwen3:32b"));
        assert!(cfg.log_json);
    }

    #[test]
    fn unparsable_ceiling_keeps_default() {
        let cfg = config(&[("BABYBEATS_WAIT_CEILING_SECS", "soon")]);
        assert_eq!(cfg.wait_ceiling, Duration::from_secs(600));
    }
}
