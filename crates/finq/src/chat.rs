use crate::agent::{Agent, LoopConfig, LoopOutcome};
use crate::cost::Cost;
use crate::errors::ProviderError;
use crate::models::message::{Message, ToolRequest};

/// Result of one user turn
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Answer(String),
    /// The round budget ran out while the model kept calling tools
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub reply: ChatReply,
    /// Tool calls made while producing the reply, in order
    pub tool_calls: Vec<ToolRequest>,
    pub cost: Cost,
}

/// A multi-turn conversation with the trading assistant.
///
/// History lives only as long as the session.
pub struct ChatSession {
    agent: Agent,
    system_prompt: String,
    history: Vec<Message>,
    config: LoopConfig,
    total_cost: Cost,
}

impl ChatSession {
    pub fn new<S: Into<String>>(agent: Agent, system_prompt: S) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            agent,
            history: vec![Message::system(system_prompt.clone())],
            system_prompt,
            config: LoopConfig::chat(),
            total_cost: Cost::default(),
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn total_cost(&self) -> Cost {
        self.total_cost
    }

    /// Forget everything but the system prompt
    pub fn clear(&mut self) {
        self.history = vec![Message::system(self.system_prompt.clone())];
    }

    /// Run one user turn. On model failure the turn is dropped from history
    /// so the session can continue from where it was.
    pub async fn ask(&mut self, input: &str) -> Result<ChatTurn, ProviderError> {
        let mut messages = self.history.clone();
        messages.push(Message::user(input));
        let seeded = messages.len();

        let run = self.agent.run(messages, &self.config).await;
        self.total_cost += run.cost;

        let tool_calls = run.conversation[seeded..]
            .iter()
            .filter_map(Message::as_assistant)
            .flat_map(|assistant| assistant.tool_calls.iter().cloned())
            .collect();

        let reply = match run.outcome {
            LoopOutcome::Answer(text) => ChatReply::Answer(text),
            LoopOutcome::Exhausted => ChatReply::Exhausted,
            LoopOutcome::ModelFailed(e) => return Err(e),
        };

        self.history = run.conversation;
        Ok(ChatTurn {
            reply,
            tool_calls,
            cost: run.cost,
        })
    }
}
