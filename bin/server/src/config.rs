//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, nested keys
//! separated by `__` (e.g. `LLM__API_KEY`, `ASSISTANT__MAX_ITERATIONS`).

use brigade_ai::LlmBackendConfig;
use brigade_ai::backend::OPENAI_BASE_URL;
use brigade_conversation::ConversationConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection URL. Threads are kept in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Model backend.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Turn limits.
    #[serde(default)]
    pub assistant: ConversationConfig,
}

/// Model backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key. Without one every turn reports the model as unavailable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: None,
        }
    }
}

impl LlmConfig {
    /// Returns the backend configuration, or `None` without an API key.
    #[must_use]
    pub fn backend(&self) -> Option<LlmBackendConfig> {
        let api_key = self.api_key.as_deref().filter(|key| !key.trim().is_empty())?;
        let mut config = if self.base_url == OPENAI_BASE_URL {
            LlmBackendConfig::openai(api_key, &self.model)
        } else {
            LlmBackendConfig::compatible(&self.base_url, &self.model).with_api_key(api_key)
        };
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        Some(config)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brigade_ai::LlmProvider;

    #[test]
    fn llm_config_has_correct_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.backend().is_none());
    }

    #[test]
    fn blank_api_key_means_no_backend() {
        let config = LlmConfig {
            api_key: Some("  ".to_string()),
            ..LlmConfig::default()
        };
        assert!(config.backend().is_none());
    }

    #[test]
    fn custom_base_url_selects_compatible_provider() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: Some("local".to_string()),
            temperature: Some(0.2),
            ..LlmConfig::default()
        };
        let backend = config.backend().unwrap();
        assert_eq!(backend.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(backend.api_key.as_deref(), Some("local"));
        assert_eq!(backend.temperature, Some(0.2));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert!(config.database_url.is_none());
        assert_eq!(config.assistant.max_iterations, 25);
    }
}
