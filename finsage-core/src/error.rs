//! Error types for FinSage core services.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering the LLM provider, configuration, exchange rates and persistence.

use std::path::PathBuf;

/// Top-level error type for the FinSage core library.
#[derive(Debug, thiserror::Error)]
pub enum FinsageError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Currency error: {0}")]
    Currency(#[from] CurrencyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Provider returned an empty completion")]
    EmptyCompletion,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the analysis/chat store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Analysis not found: {id}")]
    AnalysisNotFound { id: i64 },

    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: i64, message: String },
}

/// Errors from the exchange-rate lookup.
#[derive(Debug, thiserror::Error)]
pub enum CurrencyError {
    #[error("Exchange rate request failed: {message}")]
    Request { message: String },

    #[error("Exchange rate for {currency} missing from response")]
    MissingRate { currency: String },

    #[error("Exchange rate {rate} is not a positive finite number")]
    InvalidRate { rate: f64 },
}

/// A type alias for results using the top-level `FinsageError`.
pub type Result<T> = std::result::Result<T, FinsageError>;
