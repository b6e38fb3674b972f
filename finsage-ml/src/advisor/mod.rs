//! Natural-language loan advice backed by an [`LlmProvider`].
//!
//! Every request walks a fixed fallback chain: the full prompt, then a
//! simplified one, then static text. Advice therefore never fails; the
//! returned [`AdviceSource`] records which step produced it.

pub mod prompts;

use crate::application::{ApplicantProfile, Decision};
use crate::interpretability::FeatureImportance;
use finsage_core::config::LlmConfig;
use finsage_core::error::LlmError;
use finsage_core::providers::LlmProvider;
use finsage_core::types::{CompletionRequest, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Generation limits for each step of the fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorSettings {
    pub max_tokens: usize,
    pub temperature: f32,
    pub chat_temperature: f32,
    pub simplified_max_tokens: usize,
    pub chat_fallback_max_tokens: usize,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for AdvisorSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            chat_temperature: config.chat_temperature,
            simplified_max_tokens: config.simplified_max_tokens,
            chat_fallback_max_tokens: config.chat_fallback_max_tokens,
        }
    }
}

/// Which step of the fallback chain produced a piece of advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceSource {
    Primary,
    Simplified,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub text: String,
    pub source: AdviceSource,
}

pub struct LoanAdvisor {
    provider: Arc<dyn LlmProvider>,
    settings: AdvisorSettings,
}

impl LoanAdvisor {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: AdvisorSettings) -> Self {
        Self { provider, settings }
    }

    /// First analysis of an application.
    pub async fn initial_insights(
        &self,
        decision: Decision,
        profile: &ApplicantProfile,
        importance: &FeatureImportance,
    ) -> Advice {
        let primary = vec![
            Message::system(prompts::insights_system_prompt(decision)),
            Message::user(prompts::insights_prompt(decision, profile, importance)),
        ];
        match self
            .ask(primary, self.settings.temperature, self.settings.max_tokens)
            .await
        {
            Ok(text) => return advice(text, AdviceSource::Primary),
            Err(e) => warn!(error = %e, "Insight generation failed; retrying with a simplified prompt"),
        }

        let simplified = vec![Message::user(prompts::simplified_insights_prompt(profile))];
        match self
            .ask(
                simplified,
                self.settings.temperature,
                self.settings.simplified_max_tokens,
            )
            .await
        {
            Ok(text) => advice(text, AdviceSource::Simplified),
            Err(e) => {
                warn!(error = %e, "Simplified insight generation failed; using static advice");
                advice(prompts::STATIC_INSIGHTS.to_string(), AdviceSource::Static)
            }
        }
    }

    /// Answer a follow-up question about an analysis.
    ///
    /// `history` holds earlier turns of the conversation, oldest first; it is
    /// only sent with the full-context prompt.
    pub async fn chat(&self, context: &str, history: &[Message], question: &str) -> Advice {
        let mut primary = Vec::with_capacity(history.len() + 2);
        primary.push(Message::system(prompts::CHAT_SYSTEM_PROMPT));
        primary.extend(history.iter().cloned());
        primary.push(Message::user(prompts::chat_prompt(context, question)));
        match self
            .ask(
                primary,
                self.settings.chat_temperature,
                self.settings.max_tokens,
            )
            .await
        {
            Ok(text) => return advice(text, AdviceSource::Primary),
            Err(e) => warn!(error = %e, "Chat completion failed; retrying without context"),
        }

        let simplified = vec![
            Message::system(prompts::CHAT_FALLBACK_SYSTEM_PROMPT),
            Message::user(prompts::simplified_chat_prompt(question)),
        ];
        match self
            .ask(
                simplified,
                self.settings.chat_temperature,
                self.settings.chat_fallback_max_tokens,
            )
            .await
        {
            Ok(text) => advice(text, AdviceSource::Simplified),
            Err(e) => {
                warn!(error = %e, "Simplified chat completion failed; using static reply");
                advice(prompts::static_chat_reply(question), AdviceSource::Static)
            }
        }
    }

    async fn ask(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest::new(messages)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);
        let response = self.provider.complete(request).await?;
        debug!(
            model = %response.model,
            tokens = response.usage.total(),
            "Advisor completion received"
        );
        let text = response.message.content.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(text.to_string())
    }
}

fn advice(text: String, source: AdviceSource) -> Advice {
    Advice { text, source }
}
