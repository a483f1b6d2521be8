use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::errors::ProviderResult;
use crate::models::message::{AssistantMessage, Message};
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};

/// What the mock saw on one `complete` call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<ProviderResult<AssistantMessage>>>>,
    repeat: Option<AssistantMessage>,
    usage: Usage,
    model: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<AssistantMessage>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Like [`MockProvider::new`] but individual replies may be failures
    pub fn with_results(responses: Vec<ProviderResult<AssistantMessage>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            repeat: None,
            usage: Usage::default(),
            model: "mock".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that answers every call with the same message
    pub fn repeating(message: AssistantMessage) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(message);
        provider
    }

    /// Usage reported with every reply
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    /// Shared handle on the recorded calls, usable after the provider is boxed
    pub fn calls(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        temperature: Option<f32>,
        max_tokens: Option<i32>,
    ) -> ProviderResult<(AssistantMessage, Usage)> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            temperature,
            max_tokens,
        });

        let next = self.responses.lock().unwrap().pop_front();
        let reply = match (next, &self.repeat) {
            (Some(reply), _) => reply?,
            (None, Some(message)) => message.clone(),
            // Return empty response if no more pre-configured responses
            (None, None) => AssistantMessage::new(),
        };
        Ok((reply, self.usage.clone()))
    }
}
