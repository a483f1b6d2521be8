//! Linear token pricing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::providers::base::Usage;

/// USD per one million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub prompt: f64,
    pub completion: f64,
}

impl ModelPrice {
    pub const fn new(prompt: f64, completion: f64) -> Self {
        Self { prompt, completion }
    }
}

/// Rate used for any model missing from the table
pub const DEFAULT_PRICE: ModelPrice = ModelPrice::new(0.15, 0.60);

const BUILTIN_PRICES: &[(&str, ModelPrice)] = &[
    ("openai/gpt-4o-mini", ModelPrice::new(0.15, 0.60)),
    ("openai/gpt-4o", ModelPrice::new(2.50, 10.00)),
    ("openai/gpt-3.5-turbo", ModelPrice::new(0.50, 1.50)),
    ("anthropic/claude-3-sonnet", ModelPrice::new(3.00, 15.00)),
    ("anthropic/claude-3-haiku", ModelPrice::new(0.25, 1.25)),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Pricing {
    prices: HashMap<String, ModelPrice>,
    default: ModelPrice,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            prices: BUILTIN_PRICES
                .iter()
                .map(|(model, price)| (model.to_string(), *price))
                .collect(),
            default: DEFAULT_PRICE,
        }
    }
}

impl Pricing {
    /// Built-in table with `overrides` layered on top
    pub fn with_overrides(overrides: HashMap<String, ModelPrice>) -> Self {
        let mut pricing = Self::default();
        pricing.prices.extend(overrides);
        pricing
    }

    pub fn price_for(&self, model: &str) -> ModelPrice {
        self.prices.get(model).copied().unwrap_or(self.default)
    }

    /// Cost of a single model call. Missing token counts count as zero.
    pub fn cost(&self, model: &str, usage: &Usage) -> Cost {
        let prompt_tokens = usage.input_tokens.unwrap_or(0).max(0) as u64;
        let completion_tokens = usage.output_tokens.unwrap_or(0).max(0) as u64;
        let price = self.price_for(model);

        let usd = (prompt_tokens as f64 / 1_000_000.0) * price.prompt
            + (completion_tokens as f64 / 1_000_000.0) * price.completion;

        Cost {
            prompt_tokens,
            completion_tokens,
            usd,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub usd: f64,
}

impl Cost {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, other: Cost) -> Cost {
        Cost {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            usd: self.usd + other.usd,
        }
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, other: Cost) {
        *self = *self + other;
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::default(), Add::add)
    }
}
