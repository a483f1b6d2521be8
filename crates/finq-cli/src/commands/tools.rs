use anyhow::Result;
use console::style;
use std::time::Duration;

use finq::configuration::Settings;
use finq::finam::{FinamClient, FinamClientConfig};
use finq::systems::{ToolRegistry, TradingSystem};

pub fn execute(settings: Settings) -> Result<()> {
    // listing needs no credentials
    let finam = settings.finam;
    let client = FinamClient::new(FinamClientConfig {
        host: finam.host,
        token: finam.token.unwrap_or_default(),
        timeout: Duration::from_secs(finam.timeout_secs),
    })?;
    let mut registry = ToolRegistry::new();
    registry.add_system(Box::new(TradingSystem::new(client)));

    for system in registry.systems() {
        println!(
            "{} {}",
            style(system.name()).bold().green(),
            style(system.description()).dim()
        );
        for tool in system.tools() {
            println!("  {}", style(&tool.name).bold());
            println!("    {}", tool.description);
        }
    }
    Ok(())
}
