//! Global configuration types for revlens.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls cache
//! capacities and the model backend used for checklists and chat.

use serde::{Deserialize, Serialize};

use crate::llm::ProviderType;

/// Top-level configuration.
///
/// Loaded from `~/.revlens/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

/// Capacities of the session cache and the recency index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached review sessions.
    #[serde(default = "default_cache_cap")]
    pub cache_cap: usize,

    /// Maximum number of "recently viewed" entries.
    #[serde(default = "default_recency_cap")]
    pub recency_cap: usize,
}

fn default_cache_cap() -> usize {
    20
}

fn default_recency_cap() -> usize {
    10
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_cap: default_cache_cap(),
            recency_cap: default_recency_cap(),
        }
    }
}

impl CacheConfig {
    pub fn new(cache_cap: usize, recency_cap: usize) -> Self {
        Self {
            cache_cap,
            recency_cap,
        }
        .normalized()
    }

    /// Clamp both capacities to at least one entry.
    pub fn normalized(self) -> Self {
        Self {
            cache_cap: self.cache_cap.max(1),
            recency_cap: self.recency_cap.max(1),
        }
    }
}

/// Model backend selection and request defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderType,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the credential holding the API key.
    #[serde(default = "default_api_key_secret_name")]
    pub api_key_secret_name: String,

    /// Override the provider's default base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_api_key_secret_name() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::default(),
            model: default_model(),
            api_key_secret_name: default_api_key_secret_name(),
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}
