use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::models::message::{AssistantMessage, Message};
use crate::models::tool::{Tool, ToolCall};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            Message::System { content } | Message::User { content } => json!({
                "role": message.role(),
                "content": content,
            }),
            Message::Assistant(assistant) => {
                let mut converted = json!({
                    "role": "assistant",
                    "content": assistant.content,
                });
                if assistant.has_tool_requests() {
                    let tool_calls: Vec<Value> = assistant
                        .tool_calls
                        .iter()
                        .map(|request| {
                            json!({
                                "id": request.id,
                                "type": "function",
                                "function": {
                                    "name": sanitize_function_name(&request.tool_call.name),
                                    "arguments": arguments_to_string(&request.tool_call.arguments),
                                }
                            })
                        })
                        .collect();
                    converted["tool_calls"] = json!(tool_calls);
                }
                converted
            }
            Message::Tool(response) => json!({
                "role": "tool",
                "tool_call_id": response.tool_call_id,
                "name": response.name,
                "content": response.content,
            }),
        })
        .collect()
}

/// The wire format wants arguments as a JSON-encoded string
fn arguments_to_string(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !is_valid_function_name(&tool.name) {
            return Err(anyhow!(
                "Invalid tool name '{}', it must match [a-zA-Z0-9_-]+",
                tool.name
            ));
        }
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal AssistantMessage format
///
/// Tool-call arguments are kept exactly as received (string or object); the
/// tool registry decides how to interpret them.
pub fn openai_response_to_message(response: &Value) -> Result<AssistantMessage> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No message in response"))?;

    let mut message = AssistantMessage::new();

    if let Some(text) = original.get("content").and_then(|c| c.as_str()) {
        message.content = text.to_string();
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]
                .get("arguments")
                .cloned()
                .unwrap_or(Value::Null);

            message = message.with_tool_request(id, ToolCall::new(function_name, arguments));
        }
    }

    Ok(message)
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
