use anyhow::{anyhow, Result};
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::style;

use finq::agent::Agent;
use finq::chat::{ChatReply, ChatSession, ChatTurn};
use finq::configuration::Settings;
use finq::models::message::ToolRequest;
use finq::prompt::PromptBuilder;
use finq::systems::ToolRegistry;

use super::{build_provider, build_registry};

const THEME: &str = "zenburn";

enum Input {
    Exit,
    Clear,
    Tools,
    Empty,
    Message(String),
}

fn classify(text: &str) -> Input {
    let text = text.trim();
    match text.to_lowercase().as_str() {
        "exit" | "quit" | "выход" => Input::Exit,
        "clear" | "очистить" => Input::Clear,
        "tools" => Input::Tools,
        "" => Input::Empty,
        _ => Input::Message(text.to_string()),
    }
}

fn print_markdown(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("failed to render answer: {}", e))?;
    println!();
    Ok(())
}

fn print_tool_request(request: &ToolRequest) -> Result<()> {
    let arguments = serde_json::to_string_pretty(&request.tool_call.arguments)?;
    bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(arguments.as_bytes())
                .name(format!("Tool Request: {}", request.tool_call.name)),
        )
        .theme(THEME)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("failed to render tool call: {}", e))?;
    Ok(())
}

fn show_turn(turn: &ChatTurn, verbose: bool) -> Result<()> {
    if verbose {
        for request in &turn.tool_calls {
            print_tool_request(request)?;
        }
    }
    match &turn.reply {
        ChatReply::Answer(text) => print_markdown(text)?,
        ChatReply::Exhausted => cliclack::log::warning(format!(
            "No answer after {} tool calls, try rephrasing the question",
            turn.tool_calls.len()
        ))?,
    }
    Ok(())
}

fn list_tools(session: &ChatSession) {
    for tool in session.agent().registry().list_tools() {
        println!("  {} {}", style(&tool.name).bold(), style(&tool.description).dim());
    }
}

pub async fn execute(settings: Settings, query: Option<String>, verbose: bool) -> Result<()> {
    let provider = build_provider(&settings)?;
    let registry = match build_registry(&settings) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::warn!(error = %e, "Finam tools unavailable, chatting without them");
            ToolRegistry::new()
        }
    };
    let agent = Agent::new(provider, registry).with_pricing(settings.pricing());

    let mut system_prompt = PromptBuilder::chat_system_prompt()?;
    let systems = agent.systems_prompt();
    if !systems.is_empty() {
        system_prompt.push_str("\n\n");
        system_prompt.push_str(&systems);
    }
    let mut session = ChatSession::new(agent, system_prompt).with_config(settings.chat.loop_config());

    if let Some(query) = query {
        let turn = session.ask(&query).await?;
        return show_turn(&turn, verbose);
    }

    cliclack::intro(style(" finq chat ").on_cyan().black())?;
    println!(
        "Model {} {}",
        style(session.agent().model()).bold(),
        style("- type \"exit\" to end the session, \"clear\" to start over").dim()
    );
    println!();

    loop {
        let text: String = input("Вы:").placeholder("").interact()?;
        let message = match classify(&text) {
            Input::Exit => break,
            Input::Clear => {
                session.clear();
                cliclack::log::info("History cleared")?;
                continue;
            }
            Input::Tools => {
                list_tools(&session);
                continue;
            }
            Input::Empty => continue,
            Input::Message(message) => message,
        };

        let spin = spinner();
        spin.start("awaiting reply");
        let result = session.ask(&message).await;
        spin.stop("");

        match result {
            Ok(turn) => show_turn(&turn, verbose)?,
            Err(e) => cliclack::log::error(format!("{}", e))?,
        }
    }

    let cost = session.total_cost();
    cliclack::outro(format!(
        "Session cost: ${:.4} ({} tokens)",
        cost.usd,
        cost.total_tokens()
    ))?;
    Ok(())
}
