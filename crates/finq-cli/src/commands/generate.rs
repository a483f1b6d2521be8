use anyhow::Result;
use clap::builder::RangedU64ValueParser;
use clap::Args;
use console::style;
use std::path::PathBuf;

use finq::agent::Agent;
use finq::batch::{load_questions, save_submission, BatchDriver};
use finq::configuration::Settings;
use finq::fewshot::{load_train_examples, select_examples};
use finq::generator::{GenerationMode, RequestGenerator};
use finq::prompt::PromptBuilder;
use finq::systems::ToolRegistry;

use super::{build_provider, build_registry};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Questions to answer, `uid;question`
    #[arg(long, default_value = "data/processed/test.csv")]
    test_file: PathBuf,

    /// Worked examples, `question;type;request`
    #[arg(long, default_value = "data/processed/train.csv")]
    train_file: PathBuf,

    /// Where to write `uid;type;request` rows
    #[arg(long, default_value = "data/processed/submission.csv")]
    output_file: PathBuf,

    /// Few-shot examples per prompt [default: generation.num_examples]
    #[arg(long)]
    num_examples: Option<usize>,

    /// Tool-calling rounds per question [default: generation.max_iterations]
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    max_iterations: Option<usize>,

    /// Questions processed at the same time
    #[arg(long, default_value_t = 1, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    concurrency: usize,

    /// Answer from the endpoint catalogue alone, without tools
    #[arg(long)]
    no_tools: bool,

    /// Seed for example sampling [default: generation.seed]
    #[arg(long)]
    seed: Option<u64>,
}

pub async fn execute(settings: Settings, args: GenerateArgs) -> Result<()> {
    cliclack::intro(style(" finq generate ").on_cyan().black())?;

    let num_examples = args.num_examples.unwrap_or(settings.generation.num_examples);
    let seed = args.seed.unwrap_or(settings.generation.seed);
    let train = load_train_examples(&args.train_file)?;
    let examples = select_examples(&train, num_examples, seed);
    cliclack::log::info(format!(
        "Loaded {} of {} examples from {}",
        examples.len(),
        train.len(),
        args.train_file.display()
    ))?;

    let provider = build_provider(&settings)?;
    let (registry, mode) = if args.no_tools {
        cliclack::log::warning("Tools disabled, using the basic prompt")?;
        (ToolRegistry::new(), GenerationMode::Basic)
    } else {
        match build_registry(&settings) {
            Ok(registry) => (registry, GenerationMode::Tools),
            Err(e) => {
                cliclack::log::warning(format!(
                    "Finam tools unavailable ({}), using the basic prompt",
                    e
                ))?;
                (ToolRegistry::new(), GenerationMode::Basic)
            }
        }
    };

    let mut prompts = PromptBuilder::new();
    if let Some(path) = &settings.generation.system_prompt_file {
        prompts = prompts.with_system_template_file(path)?;
    }

    let agent = Agent::new(provider, registry).with_pricing(settings.pricing());
    let generator = RequestGenerator::new(agent, examples, mode)
        .with_prompts(prompts)
        .with_max_iterations(
            args.max_iterations
                .unwrap_or(settings.generation.max_iterations),
        );
    cliclack::log::info(format!(
        "Model {}, {} mode",
        generator.model(),
        match mode {
            GenerationMode::Tools => "tools",
            GenerationMode::Basic => "basic",
        }
    ))?;

    let questions = load_questions(&args.test_file)?;
    if questions.is_empty() {
        cliclack::outro(format!("No questions in {}", args.test_file.display()))?;
        return Ok(());
    }

    let progress = cliclack::progress_bar(questions.len() as u64);
    progress.start("Generating requests...");
    let report = BatchDriver::new(&generator)
        .with_concurrency(args.concurrency)
        .run(&questions, |_| progress.inc(1))
        .await;
    progress.stop(format!("Answered {} questions", report.items.len()));

    save_submission(&args.output_file, &report.rows())?;

    let total = report.total_cost();
    let mut summary = format!(
        "Total cost: ${:.4} ({} tokens)\nAverage per request: ${:.6}",
        total.usd,
        total.total_tokens(),
        report.average_cost()
    );
    for (method, count) in report.method_counts() {
        summary.push_str(&format!("\n  {}: {}", method, count));
    }
    cliclack::log::info(summary)?;

    let fallbacks = report.fallbacks();
    if fallbacks > 0 {
        cliclack::log::warning(format!("{} questions fell back to GET /v1/assets", fallbacks))?;
    }

    cliclack::outro(format!(
        "Wrote {} rows to {}",
        report.items.len(),
        args.output_file.display()
    ))?;
    Ok(())
}
