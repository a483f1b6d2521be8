use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::tool::{Tool, ToolCall};

/// A named group of read-only tools the model may call
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get system instructions
    fn instructions(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call one of this system's tools. `tool_call.arguments` is always a
    /// JSON object by the time it gets here.
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value>;
}
