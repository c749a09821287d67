//! File-based configuration schema
//!
//! Deserialized from `conclave.toml` (project) or the global config file,
//! merged with `CONCLAVE_`-prefixed environment variables by the loader.

use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub gateway: GatewayConfig,
    pub channel: ChannelDefaults,
    pub runner: RunnerConfig,
    pub persistence: PersistenceConfig,
}

/// OpenRouter gateway settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the OpenRouter-compatible API
    pub base_url: String,
    /// API key; falls back to the `OPENROUTER_API_KEY` environment variable
    pub api_key: Option<String>,
    /// Optional site URL sent as `HTTP-Referer` for provider rankings
    pub site_url: Option<String>,
    /// Optional site name sent as `X-Title` for provider rankings
    pub site_name: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            site_url: None,
            site_name: None,
            timeout_secs: 120,
        }
    }
}

impl GatewayConfig {
    /// The API key from config, or from the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
    }
}

/// Default channel parameters applied when a submission leaves them unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDefaults {
    pub max_rounds: u32,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            max_rounds: conclave_domain::channel::config::DEFAULT_MAX_ROUNDS,
        }
    }
}

/// Run-worker pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// REST-backed run store settings; absent URL means in-memory only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Base URL of the PostgREST-compatible store
    pub url: Option<String>,
    /// Service or anon key for the store
    pub api_key: Option<String>,
    /// Table holding run records
    pub runs_table: Option<String>,
    /// Table holding conversation messages
    pub messages_table: Option<String>,
}
