use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::generate::GenerateArgs;
use finq::configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file to read instead of ./finq.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a submission file from a file of questions
    Generate(GenerateArgs),

    /// Talk to the trading assistant
    Chat {
        /// Ask a single question and exit
        #[arg(short, long)]
        query: Option<String>,

        /// Show the tool calls behind each answer
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the tools available to the model
    Tools,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("finq=info,finq_cli=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Generate(args) => commands::generate::execute(settings, args).await,
        Command::Chat { query, verbose } => commands::chat::execute(settings, query, verbose).await,
        Command::Tools => commands::tools::execute(settings),
    }
}
