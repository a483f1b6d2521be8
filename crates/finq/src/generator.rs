use serde::Serialize;

use crate::agent::{Agent, LoopConfig, LoopOutcome};
use crate::cost::Cost;
use crate::fewshot::TrainExample;
use crate::parser::{parse_response, ApiCall};
use crate::prompt::PromptBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Model may consult the registry's tools
    Tools,
    /// One completion over the full endpoint catalogue
    Basic,
}

/// How a generation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Answered,
    Exhausted,
    ModelFailed(String),
    PromptFailed(String),
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub call: ApiCall,
    pub cost: Cost,
    pub rounds: usize,
    pub status: GenerationStatus,
}

impl GenerationOutcome {
    fn fallback(status: GenerationStatus, cost: Cost, rounds: usize) -> Self {
        Self {
            call: ApiCall::fallback(),
            cost,
            rounds,
            status,
        }
    }
}

/// Turns one question into one API call. Shares nothing mutable, so a single
/// generator can serve concurrent questions.
pub struct RequestGenerator {
    agent: Agent,
    prompts: PromptBuilder,
    examples: Vec<TrainExample>,
    mode: GenerationMode,
    config: LoopConfig,
}

impl RequestGenerator {
    pub fn new(agent: Agent, examples: Vec<TrainExample>, mode: GenerationMode) -> Self {
        let config = match mode {
            GenerationMode::Tools => LoopConfig::generation(),
            GenerationMode::Basic => LoopConfig::basic(),
        };
        Self {
            agent,
            prompts: PromptBuilder::new(),
            examples,
            mode,
            config,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Override the tool-round budget; ignored in basic mode
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        if self.mode == GenerationMode::Tools {
            self.config.max_iterations = max_iterations;
        }
        self
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn model(&self) -> &str {
        self.agent.model()
    }

    /// Always yields a call; failures resolve to `GET /v1/assets`
    pub async fn generate(&self, question: &str) -> GenerationOutcome {
        let seed = match self.mode {
            GenerationMode::Tools => self.prompts.generation_messages(
                question,
                &self.examples,
                self.agent.registry().list_tools(),
            ),
            GenerationMode::Basic => self.prompts.basic_messages(question, &self.examples),
        };
        let messages = match seed {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "could not render prompt");
                return GenerationOutcome::fallback(
                    GenerationStatus::PromptFailed(e.to_string()),
                    Cost::default(),
                    0,
                );
            }
        };

        let run = self.agent.run(messages, &self.config).await;
        match run.outcome {
            LoopOutcome::Answer(text) => GenerationOutcome {
                call: parse_response(&text),
                cost: run.cost,
                rounds: run.rounds,
                status: GenerationStatus::Answered,
            },
            LoopOutcome::Exhausted => {
                tracing::warn!(question, rounds = run.rounds, "no answer within budget");
                GenerationOutcome::fallback(GenerationStatus::Exhausted, run.cost, run.rounds)
            }
            LoopOutcome::ModelFailed(e) => {
                tracing::warn!(question, error = %e, "generation failed");
                GenerationOutcome::fallback(
                    GenerationStatus::ModelFailed(e.to_string()),
                    run.cost,
                    run.rounds,
                )
            }
        }
    }
}
