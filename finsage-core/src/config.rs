//! Configuration system for FinSage.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/finsage/config.toml` and/or `.finsage/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for FinSage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinsageConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Configuration for the text-generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name, used only for diagnostics ("groq", "openai", "local").
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key. Takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens for the full insights and chat prompts.
    pub max_tokens: usize,
    /// Temperature for initial insights.
    pub temperature: f32,
    /// Temperature for chat follow-ups.
    pub chat_temperature: f32,
    /// Maximum tokens for the simplified insights prompt.
    pub simplified_max_tokens: usize,
    /// Maximum tokens for the simplified chat prompt.
    pub chat_fallback_max_tokens: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama3-8b-8192".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            api_key: None,
            base_url: Some("https://api.groq.com/openai/v1".to_string()),
            max_tokens: 750,
            temperature: 0.5,
            chat_temperature: 0.6,
            simplified_max_tokens: 500,
            chat_fallback_max_tokens: 400,
            timeout_secs: 30,
        }
    }
}

/// Where the fitted pipeline artifact lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the JSON pipeline artifact.
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/loan_pipeline.json"),
        }
    }
}

/// INR -> USD conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Whether to query the live rate at all.
    pub live: bool,
    /// Endpoint returning `{"rates": {"USD": <f64>}}` for an INR base.
    pub rate_url: String,
    /// Rate used when the live lookup is disabled or fails.
    pub fallback_rate: f64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            live: true,
            rate_url: "https://api.exchangerate-api.com/v4/latest/INR".to_string(),
            fallback_rate: 0.012,
            timeout_secs: 5,
        }
    }
}

/// SQLite store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file. Defaults to `<data_dir>/finsage.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolve the database path, falling back to the platform data directory.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("dev", "finsage", "finsage")
            .map(|d| d.data_dir().join("finsage.db"))
            .unwrap_or_else(|| PathBuf::from(".finsage").join("finsage.db"))
    }
}

/// Command-line overrides applied on top of every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model_path: Option<PathBuf>,
    pub llm_model: Option<String>,
    pub store_path: Option<PathBuf>,
    pub offline: bool,
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `FINSAGE_`)
/// 3. Workspace-local config (`.finsage/config.toml`)
/// 4. User config (`~/.config/finsage/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<FinsageConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FinsageConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "finsage", "finsage") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".finsage").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (FINSAGE_LLM__MODEL, FINSAGE_CURRENCY__LIVE, etc.)
    figment = figment.merge(Env::prefixed("FINSAGE_").split("__"));

    if let Some(overrides) = overrides {
        if let Some(path) = &overrides.model_path {
            figment = figment.merge(Serialized::default("model.path", path));
        }
        if let Some(model) = &overrides.llm_model {
            figment = figment.merge(Serialized::default("llm.model", model));
        }
        if let Some(path) = &overrides.store_path {
            figment = figment.merge(Serialized::default("store.path", path));
        }
        if overrides.offline {
            figment = figment.merge(Serialized::default("currency.live", false));
        }
    }

    figment.extract().map_err(Box::new)
}

/// Render the effective configuration as TOML, masking any inline API key.
pub fn render_config(config: &FinsageConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
}
