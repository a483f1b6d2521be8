use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_response_to_message,
    tools_to_openai_spec,
};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::{AssistantMessage, Message};
use crate::models::tool::Tool;

/// Chat-completions client for OpenAI and OpenAI-compatible gateways
/// such as OpenRouter.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let Some(usage) = data.get("usage") else {
            return Usage::default();
        };

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok());

        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok());

        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok())
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => input.checked_add(output),
                _ => None,
            });

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {}: {}", status, body))
            }
        }
    }

    fn build_payload(
        &self,
        messages: &[Message],
        tools: &[Tool],
        temperature: Option<f32>,
        max_tokens: Option<i32>,
    ) -> Result<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages),
        });
        let fields = payload
            .as_object_mut()
            .ok_or_else(|| anyhow!("payload is not an object"))?;

        if !tools.is_empty() {
            fields.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
            fields.insert("tool_choice".to_string(), json!("auto"));
        }
        if let Some(temp) = temperature {
            fields.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = max_tokens {
            fields.insert("max_tokens".to_string(), json!(tokens));
        }
        if self.config.include_reasoning {
            fields.insert("include_reasoning".to_string(), json!(true));
        }

        Ok(payload)
    }

    async fn try_complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        temperature: Option<f32>,
        max_tokens: Option<i32>,
    ) -> Result<(AssistantMessage, Usage)> {
        let payload = self.build_payload(messages, tools, temperature, max_tokens)?;
        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("API error: {}", error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        temperature: Option<f32>,
        max_tokens: Option<i32>,
    ) -> ProviderResult<(AssistantMessage, Usage)> {
        self.try_complete(messages, tools, temperature, max_tokens)
            .await
            .map_err(|e| {
                tracing::warn!(model = %self.config.model, error = %e, "completion failed");
                ProviderError::unavailable(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let mut config = OpenAiProviderConfig::new("test_api_key");
        config.host = server.uri();
        config.model = "openai/gpt-4o-mini".to_string();
        OpenAiProvider::new(config).unwrap()
    }

    async fn setup_mock_server(response_body: Value) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "GET /v1/exchanges",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![
            Message::system("Ты эксперт по Finam TradeAPI."),
            Message::user("Какие биржи доступны?"),
        ];

        let (message, usage) = provider
            .complete(&messages, &[], Some(0.0), Some(500))
            .await?;

        assert_eq!(message.content, "GET /v1/exchanges");
        assert!(!message.has_tool_requests());
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
        assert_eq!(provider.model(), "openai/gpt-4o-mini");

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "search_instruments",
                            "arguments": "{\"query\":\"Сбербанк\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user("Какая цена Сбербанка?")];
        let tool = Tool::new(
            "search_instruments",
            "Search instruments by name or ticker",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"}
                },
                "required": ["query"]
            }),
        );

        let (message, usage) = provider.complete(&messages, &[tool], None, None).await?;

        assert_eq!(message.content, "");
        let request = &message.tool_calls[0];
        assert_eq!(request.id, "call_123");
        assert_eq!(request.tool_call.name, "search_instruments");
        assert_eq!(request.tool_call.arguments, json!("{\"query\":\"Сбербанк\"}"));
        assert_eq!(usage.total_tokens, Some(35));

        Ok(())
    }

    #[tokio::test]
    async fn test_payload_carries_sampling_and_tools() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "openai/gpt-4o-mini",
                "temperature": 0.0,
                "max_tokens": 500,
                "tool_choice": "auto"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "GET /v1/assets"}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let tool = Tool::new("get_assets", "All assets", json!({"type": "object"}));
        let (message, usage) = provider
            .complete(&[Message::user("Список активов")], &[tool], Some(0.0), Some(500))
            .await?;

        assert_eq!(message.content, "GET /v1/assets");
        assert_eq!(usage, Usage::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_usage_total_is_derived() -> Result<()> {
        let response_body = json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4}
        });
        let (_, provider) = setup_mock_server(response_body).await;

        let (_, usage) = provider
            .complete(&[Message::user("hi")], &[], None, None)
            .await?;
        assert_eq!(usage.total_tokens, Some(7));
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_is_model_unavailable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let result = provider
            .complete(&[Message::user("hi")], &[], None, None)
            .await;

        assert!(matches!(result, Err(ProviderError::ModelUnavailable(_))));
    }

    #[tokio::test]
    async fn test_error_body_is_model_unavailable() {
        let response_body = json!({
            "error": {
                "code": "context_length_exceeded",
                "message": "too long"
            }
        });
        let (_, provider) = setup_mock_server(response_body).await;

        let err = provider
            .complete(&[Message::user("hi")], &[], None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Context length exceeded"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_model_unavailable() {
        let mut config = OpenAiProviderConfig::new("key");
        config.host = "http://127.0.0.1:1".to_string();
        let provider = OpenAiProvider::new(config).unwrap();

        let result = provider
            .complete(&[Message::user("hi")], &[], None, None)
            .await;
        assert!(matches!(result, Err(ProviderError::ModelUnavailable(_))));
    }

    #[tokio::test]
    async fn test_slow_reply_is_model_unavailable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": "GET /v1/assets"}}]}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let mut config = OpenAiProviderConfig::new("test_api_key");
        config.host = mock_server.uri();
        config.timeout = Duration::from_millis(200);
        let provider = OpenAiProvider::new(config).unwrap();

        let result = provider
            .complete(&[Message::user("hi")], &[], None, None)
            .await;
        assert!(matches!(result, Err(ProviderError::ModelUnavailable(_))));
    }

    #[test]
    fn test_oversized_usage_is_dropped() {
        let usage = OpenAiProvider::get_usage(&json!({
            "usage": {"prompt_tokens": 5_000_000_000_i64, "completion_tokens": 10}
        }));
        assert_eq!(usage.input_tokens, None);
        assert_eq!(usage.output_tokens, Some(10));
        assert_eq!(usage.total_tokens, None);
    }
}
