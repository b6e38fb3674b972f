//! LLM provider abstraction.
//!
//! One request/response call per completion. `OpenAiCompatibleProvider` talks to Groq, OpenAI,
//! Ollama or any other chat-completions endpoint; `MockLlmProvider` scripts
//! responses and failures for tests.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatibleProvider;

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Trait for text-generation backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// A scripted outcome for `MockLlmProvider`.
enum MockOutcome {
    Reply(CompletionResponse),
    Fail(LlmError),
}

/// A mock LLM provider for testing and development.
///
/// Outcomes are consumed in FIFO order. Once the queue is empty every call
/// either fails (the default for `failing`) or returns a canned reply.
pub struct MockLlmProvider {
    model: String,
    outcomes: Mutex<VecDeque<MockOutcome>>,
    fail_when_empty: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            outcomes: Mutex::new(VecDeque::new()),
            fail_when_empty: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_response(Self::text_response(text));
        }
        provider
    }

    /// Create a provider whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail_when_empty: true,
            ..Self::new()
        }
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(MockOutcome::Reply(response));
    }

    /// Queue a failure for the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(MockOutcome::Fail(error));
    }

    /// All requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(MockOutcome::Reply(response)) => Ok(response),
            Some(MockOutcome::Fail(error)) => Err(error),
            None if self.fail_when_empty => Err(LlmError::Connection {
                message: "mock provider is offline".to_string(),
            }),
            None => Ok(Self::text_response(
                "I'm a mock LLM. No queued responses available.",
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_queued_in_order() {
        let mock = MockLlmProvider::new();
        mock.queue_response(MockLlmProvider::text_response("first"));
        mock.queue_error(LlmError::EmptyCompletion);
        mock.queue_response(MockLlmProvider::text_response("third"));

        let req = || CompletionRequest::new(vec![Message::user("hi")]);
        assert_eq!(mock.complete(req()).await.unwrap().message.content, "first");
        assert!(matches!(
            mock.complete(req()).await,
            Err(LlmError::EmptyCompletion)
        ));
        assert_eq!(mock.complete(req()).await.unwrap().message.content, "third");
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_mock_always_errors() {
        let mock = MockLlmProvider::failing();
        let result = mock
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await;
        assert!(matches!(result, Err(LlmError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_default_mock_has_canned_reply() {
        let mock = MockLlmProvider::default();
        let response = mock
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap();
        assert!(response.message.content.contains("mock LLM"));
        assert_eq!(mock.model_name(), "mock-model");
    }
}
