use serde::Serialize;
use std::collections::HashMap;

use crate::cost::{Cost, Pricing};
use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::prompt_template::{load_prompt, SYSTEMS_TEMPLATE};
use crate::providers::base::Provider;
use crate::systems::ToolRegistry;

/// Knobs for one run of the model/tool loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub max_iterations: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    /// Offer the registry's tools to the model
    pub use_tools: bool,
}

impl LoopConfig {
    /// Deterministic request generation with tools
    pub fn generation() -> Self {
        Self {
            max_iterations: 3,
            temperature: Some(0.0),
            max_tokens: Some(500),
            use_tools: true,
        }
    }

    /// A single tool-less completion
    pub fn basic() -> Self {
        Self {
            max_iterations: 1,
            temperature: Some(0.0),
            max_tokens: Some(200),
            use_tools: false,
        }
    }

    /// Conversational assistant
    pub fn chat() -> Self {
        Self {
            max_iterations: 5,
            temperature: Some(0.3),
            max_tokens: None,
            use_tools: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// The model replied without requesting tools
    Answer(String),
    /// Every round ended in tool calls
    Exhausted,
    ModelFailed(ProviderError),
}

/// Everything a run produced. The conversation includes the seed messages.
#[derive(Debug, Clone)]
pub struct LoopRun {
    pub outcome: LoopOutcome,
    pub conversation: Vec<Message>,
    pub rounds: usize,
    pub cost: Cost,
}

impl LoopRun {
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            LoopOutcome::Answer(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct SystemInfo {
    name: String,
    description: String,
    instructions: String,
}

/// Agent pairs a model with the tools it may call
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    pricing: Pricing,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: ToolRegistry) -> Self {
        Self {
            provider,
            registry,
            pricing: Pricing::default(),
        }
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Names and usage notes of the registered systems, ready to be appended
    /// to a system prompt. Empty when no systems are registered.
    pub fn systems_prompt(&self) -> String {
        let systems: Vec<SystemInfo> = self
            .registry
            .systems()
            .iter()
            .map(|system| SystemInfo {
                name: system.name().to_string(),
                description: system.description().to_string(),
                instructions: system.instructions().to_string(),
            })
            .collect();
        if systems.is_empty() {
            return String::new();
        }

        let mut context = HashMap::new();
        context.insert("systems", systems);
        load_prompt(SYSTEMS_TEMPLATE, &context).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not render systems prompt");
            String::new()
        })
    }

    /// Drive the model until it answers in text or `config.max_iterations`
    /// rounds have been spent. Never fails: model errors are reported in the
    /// outcome together with whatever the run accumulated.
    pub async fn run(&self, messages: Vec<Message>, config: &LoopConfig) -> LoopRun {
        let mut conversation = messages;
        let mut cost = Cost::default();
        let mut rounds = 0;

        let tools: &[Tool] = if config.use_tools {
            self.registry.list_tools()
        } else {
            &[]
        };

        while rounds < config.max_iterations {
            rounds += 1;

            let (reply, usage) = match self
                .provider
                .complete(&conversation, tools, config.temperature, config.max_tokens)
                .await
            {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::warn!(round = rounds, error = %e, "model call failed");
                    return LoopRun {
                        outcome: LoopOutcome::ModelFailed(e),
                        conversation,
                        rounds,
                        cost,
                    };
                }
            };

            cost += self.pricing.cost(self.provider.model(), &usage);

            if !reply.has_tool_requests() {
                tracing::debug!(round = rounds, "model answered");
                let answer = reply.content.clone();
                conversation.push(reply.into());
                return LoopRun {
                    outcome: LoopOutcome::Answer(answer),
                    conversation,
                    rounds,
                    cost,
                };
            }

            let requests = reply.tool_calls.clone();
            conversation.push(reply.into());

            for request in &requests {
                tracing::info!(
                    round = rounds,
                    tool = %request.tool_call.name,
                    arguments = %request.tool_call.arguments,
                    "calling tool"
                );
                let result = self
                    .registry
                    .call_tool(&request.tool_call.name, &request.tool_call.arguments)
                    .await;
                if let Err(e) = &result {
                    tracing::warn!(tool = %request.tool_call.name, error = %e, "tool failed");
                }
                conversation.push(Message::tool_response(request, &result));
            }
        }

        tracing::warn!(rounds, "round budget exhausted");
        LoopRun {
            outcome: LoopOutcome::Exhausted,
            conversation,
            rounds,
            cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AgentError, AgentResult};
    use crate::models::message::AssistantMessage;
    use crate::models::tool::ToolCall;
    use crate::providers::base::Usage;
    use crate::providers::mock::MockProvider;
    use crate::systems::System;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct EchoSystem {
        tools: Vec<Tool>,
    }

    impl EchoSystem {
        fn new() -> Self {
            Self {
                tools: vec![Tool::new(
                    "echo",
                    "Echoes back the input",
                    json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]}),
                )],
            }
        }
    }

    #[async_trait]
    impl System for EchoSystem {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "A mock system for testing"
        }

        fn instructions(&self) -> &str {
            "Call echo to repeat a message"
        }

        fn tools(&self) -> &[Tool] {
            &self.tools
        }

        async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
            match tool_call.name.as_str() {
                "echo" => Ok(tool_call.arguments["message"].clone()),
                _ => Err(AgentError::ToolNotFound(tool_call.name)),
            }
        }
    }

    fn agent_with(provider: MockProvider) -> Agent {
        let mut registry = ToolRegistry::new();
        registry.add_system(Box::new(EchoSystem::new()));
        Agent::new(Box::new(provider), registry)
    }

    #[tokio::test]
    async fn test_simple_response() {
        let provider = MockProvider::new(vec![AssistantMessage::new().with_text("Hello!")]);
        let agent = agent_with(provider);

        let run = agent
            .run(vec![Message::user("Hi")], &LoopConfig::generation())
            .await;

        assert_eq!(run.outcome, LoopOutcome::Answer("Hello!".to_string()));
        assert_eq!(run.rounds, 1);
        assert_eq!(run.conversation.len(), 2);
        assert_eq!(run.conversation[1], Message::assistant("Hello!"));
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let provider = MockProvider::new(vec![
            AssistantMessage::new()
                .with_tool_request("1", ToolCall::new("echo", json!({"message": "ping"}))),
            AssistantMessage::new().with_text("done"),
        ]);
        let calls = provider.calls();
        let agent = agent_with(provider);

        let run = agent
            .run(vec![Message::user("Echo ping")], &LoopConfig::generation())
            .await;

        assert_eq!(run.answer(), Some("done"));
        assert_eq!(run.rounds, 2);
        assert_eq!(run.conversation.len(), 4);
        let response = run.conversation[2].as_tool_response().unwrap();
        assert_eq!(response.tool_call_id, "1");
        assert_eq!(response.content, r#""ping""#);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_names, vec!["echo".to_string()]);
        assert_eq!(calls[0].temperature, Some(0.0));
        assert_eq!(calls[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_basic_config_offers_no_tools() {
        let provider = MockProvider::new(vec![AssistantMessage::new().with_text("GET /v1/assets")]);
        let calls = provider.calls();
        let agent = agent_with(provider);

        agent
            .run(vec![Message::user("q")], &LoopConfig::basic())
            .await;

        let calls = calls.lock().unwrap();
        assert!(calls[0].tool_names.is_empty());
        assert_eq!(calls[0].max_tokens, Some(200));
    }

    #[tokio::test]
    async fn test_cost_accumulates_per_round() {
        let provider = MockProvider::repeating(
            AssistantMessage::new().with_tool_request("1", ToolCall::new("echo", json!({}))),
        )
        .with_model("openai/gpt-4o")
        .with_usage(Usage::new(Some(1000), Some(100), Some(1100)));
        let agent = agent_with(provider);

        let run = agent
            .run(vec![Message::user("loop")], &LoopConfig::chat())
            .await;

        assert_eq!(run.outcome, LoopOutcome::Exhausted);
        assert_eq!(run.rounds, 5);
        assert_eq!(run.cost.prompt_tokens, 5000);
        assert_eq!(run.cost.completion_tokens, 500);
        let expected = 5.0 * (1000.0 * 2.50 + 100.0 * 10.00) / 1_000_000.0;
        assert!((run.cost.usd - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let provider = MockProvider::with_results(vec![Err(ProviderError::ModelUnavailable(
            "503".to_string(),
        ))]);
        let agent = agent_with(provider);

        let run = agent
            .run(vec![Message::user("q")], &LoopConfig::generation())
            .await;

        assert_eq!(
            run.outcome,
            LoopOutcome::ModelFailed(ProviderError::ModelUnavailable("503".to_string()))
        );
        assert_eq!(run.rounds, 1);
        assert_eq!(run.conversation.len(), 1);
    }

    #[test]
    fn test_systems_prompt_lists_systems() {
        let agent = agent_with(MockProvider::new(vec![]));
        let prompt = agent.systems_prompt();
        assert!(prompt.contains("echo"));
        assert!(prompt.contains("Call echo to repeat a message"));

        let bare = Agent::new(Box::new(MockProvider::new(vec![])), ToolRegistry::new());
        assert_eq!(bare.systems_prompt(), "");
    }
}
