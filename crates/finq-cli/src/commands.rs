pub mod chat;
pub mod generate;
pub mod tools;

use anyhow::Result;

use finq::configuration::Settings;
use finq::finam::FinamClient;
use finq::providers::base::Provider;
use finq::providers::openai::OpenAiProvider;
use finq::systems::{ToolRegistry, TradingSystem};

pub fn build_provider(settings: &Settings) -> Result<Box<dyn Provider>> {
    let config = settings.provider.clone().into_config()?;
    Ok(Box::new(OpenAiProvider::new(config)?))
}

/// Registry with the Finam tools; fails when the brokerage is not configured
pub fn build_registry(settings: &Settings) -> Result<ToolRegistry> {
    let client = FinamClient::new(settings.finam.clone().into_config()?)?;
    let mut registry = ToolRegistry::new().with_timeout(settings.generation.tool_timeout());
    registry.add_system(Box::new(TradingSystem::new(client)));
    Ok(registry)
}
