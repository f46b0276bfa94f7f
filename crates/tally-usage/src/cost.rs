//! Cost estimation from token counters.
//!
//! Rates are USD per million tokens. The default table is the Opus tier:
//!
//! | Tier   | Base input | Cache write | Cache read | Output |
//! |--------|-----------:|------------:|-----------:|-------:|
//! | opus   | 15.00      | 18.75       | 1.50       | 75.00  |
//! | sonnet | 3.00       | 3.75        | 0.30       | 15.00  |
//! | haiku  | 0.80       | 1.00        | 0.08       | 4.00   |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::UsageCounters;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// Published pricing tiers with a built-in rate table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingTier {
    #[default]
    Opus,
    Sonnet,
    Haiku,
}

impl PricingTier {
    pub fn rates(&self) -> RateTable {
        match self {
            Self::Opus => RateTable::new(15.0, 18.75, 1.50, 75.0),
            Self::Sonnet => RateTable::new(3.0, 3.75, 0.30, 15.0),
            Self::Haiku => RateTable::new(0.80, 1.0, 0.08, 4.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opus => "opus",
            Self::Sonnet => "sonnet",
            Self::Haiku => "haiku",
        }
    }
}

impl fmt::Display for PricingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        if s.contains("opus") {
            Ok(Self::Opus)
        } else if s.contains("sonnet") {
            Ok(Self::Sonnet)
        } else if s.contains("haiku") {
            Ok(Self::Haiku)
        } else {
            Err(format!(
                "unknown pricing tier '{s}' (expected 'opus', 'sonnet' or 'haiku')"
            ))
        }
    }
}

/// Per-category rates in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub base_input: f64,
    pub cache_write: f64,
    pub cache_read: f64,
    pub output: f64,
}

impl RateTable {
    pub fn new(base_input: f64, cache_write: f64, cache_read: f64, output: f64) -> Self {
        Self {
            base_input,
            cache_write,
            cache_read,
            output,
        }
    }

    /// Name of the first rate that is negative or not finite.
    pub fn invalid_rate(&self) -> Option<&'static str> {
        [
            ("base_input", self.base_input),
            ("cache_write", self.cache_write),
            ("cache_read", self.cache_read),
            ("output", self.output),
        ]
        .into_iter()
        .find(|(_, rate)| !rate.is_finite() || *rate < 0.0)
        .map(|(name, _)| name)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        PricingTier::default().rates()
    }
}

/// Estimated cost split by token category. Values are unrounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostEstimate {
    pub base_input_cost: f64,
    pub cache_write_cost: f64,
    pub cache_read_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CostEstimate {
    /// Base input plus both cache categories.
    pub fn input_cost(&self) -> f64 {
        self.base_input_cost + self.cache_write_cost + self.cache_read_cost
    }
}

/// Estimate the cost of `counters` under `rates`.
pub fn estimate_cost(counters: &UsageCounters, rates: &RateTable) -> CostEstimate {
    let base_input_cost = per_million(counters.input_tokens, rates.base_input);
    let cache_write_cost = per_million(counters.cache_creation_input_tokens, rates.cache_write);
    let cache_read_cost = per_million(counters.cache_read_input_tokens, rates.cache_read);
    let output_cost = per_million(counters.output_tokens, rates.output);

    CostEstimate {
        base_input_cost,
        cache_write_cost,
        cache_read_cost,
        output_cost,
        total_cost: base_input_cost + cache_write_cost + cache_read_cost + output_cost,
    }
}

fn per_million(tokens: u64, rate: f64) -> f64 {
    tokens as f64 / TOKENS_PER_UNIT * rate
}
