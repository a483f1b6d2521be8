//! Worked examples embedded in generation prompts.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::parser::HttpMethod;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_NUM_EXAMPLES: usize = 10;

/// Slots reserved for the rarer methods when sampling
const POST_SLOTS: usize = 2;
const DELETE_SLOTS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainExample {
    pub question: String,
    #[serde(rename = "type")]
    pub method: HttpMethod,
    pub request: String,
}

/// Read `question;type;request` rows. Rows that fail to parse are skipped.
pub fn read_train_examples<R: Read>(reader: R) -> Result<Vec<TrainExample>> {
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut examples = Vec::new();
    for (line, row) in csv.deserialize::<TrainExample>().enumerate() {
        match row {
            Ok(example) => examples.push(example),
            Err(e) => tracing::warn!(row = line + 1, error = %e, "skipping training row"),
        }
    }
    Ok(examples)
}

pub fn load_train_examples(path: impl AsRef<Path>) -> Result<Vec<TrainExample>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open training file {}", path.display()))?;
    read_train_examples(file)
}

/// Pick a balanced sample: up to `n - 3` GET examples, two POST and one
/// DELETE, in that order, truncated to `n`. The same seed always yields the
/// same selection.
pub fn select_examples(examples: &[TrainExample], n: usize, seed: u64) -> Vec<TrainExample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let quotas = [
        (HttpMethod::Get, n.saturating_sub(POST_SLOTS + DELETE_SLOTS)),
        (HttpMethod::Post, POST_SLOTS),
        (HttpMethod::Delete, DELETE_SLOTS),
    ];

    let mut selected = Vec::with_capacity(n);
    for (method, quota) in quotas {
        let pool: Vec<&TrainExample> = examples.iter().filter(|e| e.method == method).collect();
        selected.extend(
            pool.choose_multiple(&mut rng, quota.min(pool.len()))
                .map(|e| (*e).clone()),
        );
    }
    selected.truncate(n);
    selected
}
