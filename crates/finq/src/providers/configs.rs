use std::time::Duration;

pub const OPENROUTER_HOST: &str = "https://openrouter.ai/api";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Connection settings for an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    /// Ask the backend to return reasoning tokens (OpenRouter extension)
    pub include_reasoning: bool,
    pub timeout: Duration,
}

impl OpenAiProviderConfig {
    pub fn new<K: Into<String>>(api_key: K) -> Self {
        Self {
            host: OPENROUTER_HOST.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            include_reasoning: false,
            timeout: Duration::from_secs(60),
        }
    }
}
