use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model used when an event carries no model of its own
pub const DEFAULT_MODEL: &str = "claude-opus-4-6";

/// Per-million-token rates for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

/// Model identifier -> rates. Read-only once handed to the parser side.
pub type PricingTable = HashMap<String, ModelPricing>;

/// Token counters shared by skills, overhead segments and subagents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
}

impl TokenCounts {
    pub fn add(&mut self, other: &TokenCounts) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
        self.cache_read = self.cache_read.saturating_add(other.cache_read);
        self.cache_write = self.cache_write.saturating_add(other.cache_write);
    }

    /// Sum of all four buckets
    pub fn total(&self) -> u64 {
        self.context_size().saturating_add(self.output)
    }

    /// Input side of a turn: what the model had in its context window
    pub fn context_size(&self) -> u64 {
        self.input
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_write)
    }

    pub fn has_usage(&self) -> bool {
        self.total() > 0
    }

    pub fn cost(&self, model: &str, pricing: &PricingTable) -> f64 {
        calculate_cost(
            model,
            self.input,
            self.output,
            self.cache_read,
            self.cache_write,
            pricing,
        )
    }
}

/// Built-in rates, USD per million tokens
pub fn default_pricing() -> PricingTable {
    let mut table = PricingTable::new();
    table.insert(
        "claude-opus-4-6".to_string(),
        ModelPricing {
            input: 5.0,
            output: 25.0,
            cache_read: 0.5,
            cache_write: 6.25,
        },
    );
    table.insert(
        "claude-sonnet-4-5-20250929".to_string(),
        ModelPricing {
            input: 3.0,
            output: 15.0,
            cache_read: 0.3,
            cache_write: 3.75,
        },
    );
    table.insert(
        "claude-haiku-4-5-20251001".to_string(),
        ModelPricing {
            input: 1.0,
            output: 5.0,
            cache_read: 0.1,
            cache_write: 1.25,
        },
    );
    table
}

/// Calculate the dollar cost of a token mix.
///
/// Unknown models cost nothing. The result is rounded to 6 decimal places so
/// that many small additions do not drift.
pub fn calculate_cost(
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
    cache_read_tokens: u64,
    cache_write_tokens: u64,
    pricing: &PricingTable,
) -> f64 {
    let Some(rates) = pricing.get(model) else {
        return 0.0;
    };

    let cost = (input_tokens as f64 / 1_000_000.0) * rates.input
        + (output_tokens as f64 / 1_000_000.0) * rates.output
        + (cache_read_tokens as f64 / 1_000_000.0) * rates.cache_read
        + (cache_write_tokens as f64 / 1_000_000.0) * rates.cache_write;

    (cost * 1_000_000.0).round() / 1_000_000.0
}

/// Map short model names used by subagent dispatches to pricing keys
pub fn resolve_model(model: &str) -> &str {
    match model {
        "opus" | "inherit" => "claude-opus-4-6",
        "sonnet" => "claude-sonnet-4-5-20250929",
        "haiku" => "claude-haiku-4-5-20251001",
        other => other,
    }
}

/// Short display name, e.g. "claude-opus-4-6" -> "opus"
pub fn model_display_name(model: &str) -> &str {
    model.split('-').nth(1).unwrap_or(model)
}
