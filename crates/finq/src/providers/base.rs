use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderResult;
use crate::models::message::{AssistantMessage, Message};
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Base trait for language-model backends
///
/// A provider is stateless between calls: the whole conversation, system
/// message included, is sent on every request.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name of the model requests are sent to, used for pricing
    fn model(&self) -> &str;

    /// Generate the next assistant message for the conversation
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        temperature: Option<f32>,
        max_tokens: Option<i32>,
    ) -> ProviderResult<(AssistantMessage, Usage)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_defaults_to_unknown() {
        let usage = Usage::default();
        assert_eq!(usage, Usage::new(None, None, None));

        let usage = Usage::new(Some(1200), Some(15), None);
        assert_eq!(usage.input_tokens, Some(1200));
        assert!(usage.total_tokens.is_none());
    }
}
