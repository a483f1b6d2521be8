use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::{AsRefStr, Display};

use super::tool::ToolCall;
use crate::errors::AgentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: ToolCall,
}

/// The answer to exactly one [`ToolRequest`], carried by a `tool` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool_call_id: String,
    pub name: String,
    /// JSON-encoded tool payload, or `{"error": ...}` when the call failed
    pub content: String,
}

/// A reply produced by the model: text, tool requests, or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolRequest>,
}

impl AssistantMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text content of the reply
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = text.into();
        self
    }

    /// Add a tool request to the reply
    pub fn with_tool_request<S: Into<String>>(mut self, id: S, tool_call: ToolCall) -> Self {
        self.tool_calls.push(ToolRequest {
            id: id.into(),
            tool_call,
        });
        self
    }

    pub fn has_tool_requests(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A message in a conversation, discriminated by its role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant(AssistantMessage),
    Tool(ToolResponse),
}

impl Message {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create an assistant message holding only text
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message::Assistant(AssistantMessage::new().with_text(content))
    }

    /// Create the `tool` message answering `request` with the given result
    pub fn tool_response(request: &ToolRequest, result: &AgentResult<Value>) -> Self {
        Message::Tool(ToolResponse {
            tool_call_id: request.id.clone(),
            name: request.tool_call.name.clone(),
            content: render_tool_result(result),
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant(_) => Role::Assistant,
            Message::Tool(_) => Role::Tool,
        }
    }

    /// The text carried by the message, empty for tool-only assistant turns
    pub fn text(&self) -> &str {
        match self {
            Message::System { content } | Message::User { content } => content,
            Message::Assistant(assistant) => &assistant.content,
            Message::Tool(response) => &response.content,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Message::Assistant(assistant) => Some(assistant),
            _ => None,
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        match self {
            Message::Tool(response) => Some(response),
            _ => None,
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(assistant: AssistantMessage) -> Self {
        Message::Assistant(assistant)
    }
}

/// Serialize a tool result for the model. Errors become `{"error": "..."}` so
/// a failed call is still an ordinary tool reply.
pub fn render_tool_result(result: &AgentResult<Value>) -> String {
    match result {
        Ok(payload) => payload.to_string(),
        Err(e) => json!({ "error": e.to_string() }).to_string(),
    }
}
