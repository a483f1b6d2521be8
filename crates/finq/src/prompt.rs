use anyhow::{Context as _, Result};
use serde::Serialize;
use std::path::Path;
use tera::Error as TeraError;

use crate::fewshot::TrainExample;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::prompt_template::{
    load_prompt, BASIC_TEMPLATE, CATALOGUE_TEMPLATE, CHAT_SYSTEM_TEMPLATE, EXAMPLES_TEMPLATE,
    GENERATE_SYSTEM_TEMPLATE, GENERATE_USER_TEMPLATE,
};

#[derive(Serialize)]
struct CatalogueContext {
    extended: bool,
}

#[derive(Serialize)]
struct ExamplesContext<'a> {
    examples: &'a [TrainExample],
}

#[derive(Serialize)]
struct SystemContext<'a> {
    tools: &'a [Tool],
    catalogue: String,
}

#[derive(Serialize)]
struct QuestionContext<'a> {
    question: &'a str,
    examples: String,
    catalogue: String,
}

/// Renders the conversations that seed request generation
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    system_template: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tool-mode system prompt with a template read from disk.
    /// The template sees `tools` and `catalogue`.
    pub fn with_system_template_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read system prompt {}", path.display()))?;
        self.system_template = Some(template);
        Ok(self)
    }

    fn catalogue(extended: bool) -> Result<String, TeraError> {
        load_prompt(CATALOGUE_TEMPLATE, &CatalogueContext { extended })
    }

    /// The few-shot block: one `Вопрос`/`Ответ` pair per example
    pub fn examples_block(examples: &[TrainExample]) -> Result<String, TeraError> {
        load_prompt(EXAMPLES_TEMPLATE, &ExamplesContext { examples })
    }

    /// System and user messages for tool-assisted generation
    pub fn generation_messages(
        &self,
        question: &str,
        examples: &[TrainExample],
        tools: &[Tool],
    ) -> Result<Vec<Message>, TeraError> {
        let template = self
            .system_template
            .as_deref()
            .unwrap_or(GENERATE_SYSTEM_TEMPLATE);
        let system = load_prompt(
            template,
            &SystemContext {
                tools,
                catalogue: Self::catalogue(false)?,
            },
        )?;
        let user = load_prompt(
            GENERATE_USER_TEMPLATE,
            &QuestionContext {
                question,
                examples: Self::examples_block(examples)?,
                catalogue: String::new(),
            },
        )?;

        Ok(vec![Message::system(system), Message::user(user)])
    }

    /// A single user message carrying the full catalogue, for tool-less runs
    pub fn basic_messages(
        &self,
        question: &str,
        examples: &[TrainExample],
    ) -> Result<Vec<Message>, TeraError> {
        let prompt = load_prompt(
            BASIC_TEMPLATE,
            &QuestionContext {
                question,
                examples: Self::examples_block(examples)?,
                catalogue: Self::catalogue(true)?,
            },
        )?;
        Ok(vec![Message::user(prompt)])
    }

    pub fn chat_system_prompt() -> Result<String, TeraError> {
        load_prompt(CHAT_SYSTEM_TEMPLATE, &serde_json::json!({}))
    }
}
