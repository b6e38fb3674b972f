//! # FinSage Core
//!
//! Core services for the FinSage loan advisor: layered configuration, the LLM
//! provider interface, the INR exchange-rate client, and SQLite persistence of
//! analyses and chat transcripts.

pub mod config;
pub mod currency;
pub mod error;
pub mod providers;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{ConfigOverrides, FinsageConfig, LlmConfig};
pub use currency::{ExchangeRate, ExchangeRateClient, RateSource};
pub use error::{FinsageError, LlmError, Result};
pub use providers::{LlmProvider, MockLlmProvider, OpenAiCompatibleProvider};
pub use store::{AnalysisStore, ChatRecord, StoredAnalysis};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
