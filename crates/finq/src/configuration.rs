use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::agent::LoopConfig;
use crate::cost::{ModelPrice, Pricing};
use crate::fewshot::{DEFAULT_NUM_EXAMPLES, DEFAULT_SEED};
use crate::finam::{FinamClientConfig, FINAM_HOST};
use crate::providers::configs::{OpenAiProviderConfig, DEFAULT_MODEL, OPENROUTER_HOST};

pub const ENV_PREFIX: &str = "FINQ";
/// Looked up in the working directory when no file is given
pub const DEFAULT_CONFIG_FILE: &str = "finq";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value, set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// `provider.api_key` -> `FINQ_PROVIDER__API_KEY`
pub fn to_env_var(field: &str) -> String {
    format!("{}_{}", ENV_PREFIX, field.replace('.', "__").to_uppercase())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub include_reasoning: bool,
    pub timeout_secs: u64,
}

impl ProviderSettings {
    pub fn into_config(self) -> Result<OpenAiProviderConfig, ConfigError> {
        let api_key = self.api_key.ok_or_else(|| ConfigError::MissingEnvVar {
            env_var: to_env_var("provider.api_key"),
        })?;
        Ok(OpenAiProviderConfig {
            host: self.host,
            api_key,
            model: self.model,
            include_reasoning: self.include_reasoning,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinamSettings {
    pub host: String,
    #[serde(default)]
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl FinamSettings {
    pub fn into_config(self) -> Result<FinamClientConfig, ConfigError> {
        let token = self.token.ok_or_else(|| ConfigError::MissingEnvVar {
            env_var: to_env_var("finam.token"),
        })?;
        Ok(FinamClientConfig {
            host: self.host,
            token,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    pub max_iterations: usize,
    pub num_examples: usize,
    pub seed: u64,
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

impl GenerationSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    pub max_iterations: usize,
    pub temperature: f32,
}

impl ChatSettings {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_iterations: self.max_iterations,
            temperature: Some(self.temperature),
            ..LoopConfig::chat()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub finam: FinamSettings,
    pub generation: GenerationSettings,
    pub chat: ChatSettings,
    /// Per-model overrides of the built-in price table
    #[serde(default)]
    pub pricing: HashMap<String, ModelPrice>,
}

impl Settings {
    /// Defaults, then `finq.toml` if present, then `FINQ_*` variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Like [`Settings::new`] but reads `config_file` instead of `finq.toml`;
    /// the file must exist.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .set_default("provider.host", OPENROUTER_HOST)?
            .set_default("provider.model", DEFAULT_MODEL)?
            .set_default("provider.include_reasoning", false)?
            .set_default("provider.timeout_secs", 60)?
            .set_default("finam.host", FINAM_HOST)?
            .set_default("finam.timeout_secs", 30)?
            .set_default("generation.max_iterations", 3)?
            .set_default("generation.num_examples", DEFAULT_NUM_EXAMPLES as u64)?
            .set_default("generation.seed", DEFAULT_SEED)?
            .set_default("generation.tool_timeout_secs", 30)?
            .set_default("chat.max_iterations", 5)?
            .set_default("chat.temperature", 0.3)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => settings.validated(),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    fn validated(self) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("generation.max_iterations", self.generation.max_iterations),
            ("chat.max_iterations", self.chat.max_iterations),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(self)
    }

    pub fn pricing(&self) -> Pricing {
        Pricing::with_overrides(self.pricing.clone())
    }
}
