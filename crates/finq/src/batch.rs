//! Question files in, submission files out.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::cost::Cost;
use crate::generator::{GenerationOutcome, GenerationStatus, RequestGenerator};
use crate::parser::HttpMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub uid: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub uid: String,
    #[serde(rename = "type")]
    pub method: HttpMethod,
    pub request: String,
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(input)
}

pub fn read_questions<R: Read>(input: R) -> Result<Vec<Question>> {
    reader(input)
        .deserialize::<Question>()
        .enumerate()
        .map(|(line, row)| row.with_context(|| format!("Invalid question row {}", line + 1)))
        .collect()
}

pub fn load_questions(path: impl AsRef<Path>) -> Result<Vec<Question>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open questions file {}", path.display()))?;
    read_questions(file)
}

pub fn read_submission<R: Read>(input: R) -> Result<Vec<SubmissionRow>> {
    Ok(reader(input)
        .deserialize::<SubmissionRow>()
        .collect::<Result<_, _>>()?)
}

pub fn write_submission<W: Write>(output: W, rows: &[SubmissionRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(output);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write rows to `path`, creating parent directories as needed
pub fn save_submission(path: impl AsRef<Path>, rows: &[SubmissionRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_submission(file, rows)
}

/// One generated row plus how it came about
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub row: SubmissionRow,
    pub outcome: GenerationOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn rows(&self) -> Vec<SubmissionRow> {
        self.items.iter().map(|item| item.row.clone()).collect()
    }

    pub fn total_cost(&self) -> Cost {
        self.items.iter().map(|item| item.outcome.cost).sum()
    }

    pub fn average_cost(&self) -> f64 {
        if self.items.is_empty() {
            0.0
        } else {
            self.total_cost().usd / self.items.len() as f64
        }
    }

    pub fn method_counts(&self) -> BTreeMap<HttpMethod, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.row.method).or_insert(0) += 1;
        }
        counts
    }

    /// Questions that did not get a real answer from the model
    pub fn fallbacks(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome.status != GenerationStatus::Answered)
            .count()
    }
}

/// Runs a generator over many questions
pub struct BatchDriver<'a> {
    generator: &'a RequestGenerator,
    concurrency: usize,
}

impl<'a> BatchDriver<'a> {
    pub fn new(generator: &'a RequestGenerator) -> Self {
        Self {
            generator,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Generate a row per question, in input order. `on_done` fires after
    /// each question completes, in completion order.
    pub async fn run<F>(&self, questions: &[Question], mut on_done: F) -> BatchReport
    where
        F: FnMut(&BatchItem),
    {
        let generator = self.generator;
        let mut results = stream::iter(questions)
            .map(|question| async move {
                let outcome = generator.generate(&question.question).await;
                BatchItem {
                    row: SubmissionRow {
                        uid: question.uid.clone(),
                        method: outcome.call.method,
                        request: outcome.call.path.clone(),
                    },
                    outcome,
                }
            })
            .buffered(self.concurrency);

        let mut items = Vec::with_capacity(questions.len());
        while let Some(item) = results.next().await {
            on_done(&item);
            items.push(item);
        }

        tracing::info!(
            questions = items.len(),
            concurrency = self.concurrency,
            "batch finished"
        );
        BatchReport { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_read_questions() {
        let input = indoc! {"
            uid;question
            q1;Какая цена Сбербанка?
            q2; Покажи биржи
        "};
        let questions = read_questions(input.as_bytes()).unwrap();
        assert_eq!(
            questions,
            vec![
                Question {
                    uid: "q1".to_string(),
                    question: "Какая цена Сбербанка?".to_string()
                },
                Question {
                    uid: "q2".to_string(),
                    question: "Покажи биржи".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let input = "uid;text\nq1;hello\n";
        assert!(read_questions(input.as_bytes()).is_err());
    }

    #[test]
    fn test_submission_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("submission.csv");
        let rows = vec![
            SubmissionRow {
                uid: "q1".to_string(),
                method: HttpMethod::Get,
                request: "/v1/instruments/SBER@MISX/quotes/latest".to_string(),
            },
            SubmissionRow {
                uid: "q2".to_string(),
                method: HttpMethod::Delete,
                request: "/v1/accounts/A1/orders/7".to_string(),
            },
        ];

        save_submission(&path, &rows).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("uid;type;request\nq1;GET;/v1/instruments/SBER@MISX/quotes/latest\n"));
        let back = read_submission(raw.as_bytes()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_empty_report() {
        let report = BatchReport::default();
        assert_eq!(report.average_cost(), 0.0);
        assert!(report.method_counts().is_empty());
        assert_eq!(report.fallbacks(), 0);
    }
}
