use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use finq::errors::{AgentError, AgentResult};
use finq::models::tool::{Tool, ToolCall};
use finq::systems::{System, ToolRegistry};

/// A simple system that echoes input back to the caller
pub struct EchoSystem {
    tools: Vec<Tool>,
}

impl EchoSystem {
    pub fn new() -> Self {
        Self {
            tools: vec![Tool::new(
                "echo",
                "reply with the input",
                json!({
                    "type": "object",
                    "properties": {
                        "message": {
                            "type": "string",
                            "description": "The message to echo"
                        }
                    },
                    "required": ["message"]
                }),
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
        "A simple system that echoes input back to the caller"
    }

    fn instructions(&self) -> &str {
        "Use the echo tool to get a response back with your input message"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        let message = tool_call
            .arguments
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidParameters("message parameter required".into()))?;
        Ok(json!({ "echo": message, "arguments": tool_call.arguments }))
    }
}

/// Tools that misbehave in every way a tool can
struct UnrulySystem {
    tools: Vec<Tool>,
}

impl UnrulySystem {
    fn new() -> Self {
        let empty = json!({"type": "object", "properties": {}});
        Self {
            tools: vec![
                Tool::new("fail", "always fails", empty.clone()),
                Tool::new("panic", "always panics", empty.clone()),
                Tool::new("hang", "never returns in time", empty),
            ],
        }
    }
}

#[async_trait]
impl System for UnrulySystem {
    fn name(&self) -> &str {
        "unruly"
    }

    fn description(&self) -> &str {
        "Misbehaving tools"
    }

    fn instructions(&self) -> &str {
        ""
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        match tool_call.name.as_str() {
            "fail" => Err(AgentError::ExecutionError("connection refused".into())),
            "panic" => panic!("tool blew up"),
            "hang" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!({}))
            }
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new().with_timeout(Duration::from_millis(100));
    registry.add_system(Box::new(EchoSystem::new()));
    registry.add_system(Box::new(UnrulySystem::new()));
    registry
}

#[test]
fn test_tools_listed_in_registration_order() {
    let registry = registry();
    let names: Vec<&str> = registry
        .list_tools()
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(names, vec!["echo", "fail", "panic", "hang"]);

    // cached: the same slice comes back
    assert!(std::ptr::eq(registry.list_tools(), registry.list_tools()));
}

#[tokio::test]
async fn test_echo_with_object_arguments() {
    let result = registry()
        .call_tool("echo", &json!({"message": "hello world"}))
        .await
        .unwrap();
    assert_eq!(result["echo"], "hello world");
}

#[tokio::test]
async fn test_echo_with_string_arguments() {
    let result = registry()
        .call_tool("echo", &json!(r#"{"message": "привет"}"#))
        .await
        .unwrap();
    assert_eq!(result["echo"], "привет");
}

#[tokio::test]
async fn test_malformed_arguments_become_empty() {
    let registry = registry();
    let err = registry
        .call_tool("echo", &json!("{broken"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AgentError::InvalidParameters("message parameter required".into())
    );
}

#[tokio::test]
async fn test_unknown_tool() {
    let err = registry()
        .call_tool("place_order", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown tool: place_order");
}

#[tokio::test]
async fn test_failures_are_contained() {
    let registry = registry();

    let err = registry.call_tool("fail", &json!({})).await.unwrap_err();
    assert!(err.to_string().contains("connection refused"));

    let err = registry.call_tool("panic", &json!({})).await.unwrap_err();
    assert!(matches!(err, AgentError::ExecutionError(_)));

    let err = registry.call_tool("hang", &Value::Null).await.unwrap_err();
    assert!(err.to_string().contains("timed out"));

    // the registry is still usable afterwards
    assert!(registry
        .call_tool("echo", &json!({"message": "still here"}))
        .await
        .is_ok());
}
