use futures::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;
use std::time::Duration;

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes tool calls by name to the system that declared the tool.
///
/// The tool list is computed on first use and then frozen, so systems must be
/// added before the registry is handed to an agent.
pub struct ToolRegistry {
    systems: Vec<Box<dyn System>>,
    tools: OnceLock<Vec<Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            tools: OnceLock::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
        self.tools = OnceLock::new();
    }

    pub fn systems(&self) -> &[Box<dyn System>] {
        &self.systems
    }

    pub fn is_empty(&self) -> bool {
        self.list_tools().is_empty()
    }

    /// All tools across systems, in registration order
    pub fn list_tools(&self) -> &[Tool] {
        self.tools.get_or_init(|| {
            self.systems
                .iter()
                .flat_map(|system| system.tools().iter().cloned())
                .collect()
        })
    }

    fn system_for_tool(&self, name: &str) -> Option<&dyn System> {
        self.systems
            .iter()
            .find(|system| system.tools().iter().any(|tool| tool.name == name))
            .map(|v| &**v)
    }

    /// Execute a tool by name. Never panics and never hangs past the
    /// configured timeout; every failure comes back as an `Err`.
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> AgentResult<Value> {
        let system = self
            .system_for_tool(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        let call = ToolCall::new(name, normalize_arguments(arguments));
        let execution = AssertUnwindSafe(system.call(call)).catch_unwind();

        match tokio::time::timeout(self.timeout, execution).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                tracing::error!(tool = name, "tool panicked");
                Err(AgentError::ExecutionError(format!("tool {} panicked", name)))
            }
            Err(_) => {
                tracing::warn!(tool = name, timeout = ?self.timeout, "tool timed out");
                Err(AgentError::ExecutionError(format!(
                    "tool {} timed out after {}s",
                    name,
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

/// Arguments arrive either as an object or as a JSON-encoded string. Anything
/// that does not end up as an object becomes `{}`.
pub fn normalize_arguments(arguments: &Value) -> Value {
    let parsed = match arguments {
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "malformed tool arguments, using {{}}");
                None
            }
        },
        other => Some(other.clone()),
    };

    match parsed {
        Some(Value::Object(map)) => Value::Object(map),
        _ => Value::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_string_arguments() {
        assert_eq!(
            normalize_arguments(&json!(r#"{"query": "SBER"}"#)),
            json!({"query": "SBER"})
        );
    }

    #[test]
    fn test_normalize_object_passes_through() {
        let args = json!({"symbol": "GAZP@MISX"});
        assert_eq!(normalize_arguments(&args), args);
    }

    #[test]
    fn test_normalize_degrades_to_empty() {
        assert_eq!(normalize_arguments(&json!("{not json")), json!({}));
        assert_eq!(normalize_arguments(&json!("")), json!({}));
        assert_eq!(normalize_arguments(&Value::Null), json!({}));
        assert_eq!(normalize_arguments(&json!("[1, 2]")), json!({}));
        assert_eq!(normalize_arguments(&json!(42)), json!({}));
    }

    #[tokio::test]
    async fn test_empty_registry_rejects_everything() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());

        let err = registry.call_tool("get_quote", &json!({})).await.unwrap_err();
        assert_eq!(err, AgentError::ToolNotFound("get_quote".to_string()));
        assert_eq!(err.to_string(), "unknown tool: get_quote");
    }
}
