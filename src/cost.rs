//! Monetary cost estimation from token usage

use serde::{Deserialize, Serialize};

use crate::request::TokenUsage;

/// Default USD rate per 1k prompt tokens
pub const RATE_PROMPT_PER_1K: f64 = 0.0015;
/// Default USD rate per 1k completion tokens
pub const RATE_COMPLETION_PER_1K: f64 = 0.002;

/// Per-backend token pricing, USD per 1k tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates
{   pub prompt_per_1k: f64
  , pub completion_per_1k: f64
}

impl Default for CostRates
{   fn default() -> Self
    {   CostRates
        {   prompt_per_1k: RATE_PROMPT_PER_1K
          , completion_per_1k: RATE_COMPLETION_PER_1K
        }
    }
}

/// Pure cost estimator; no side effects, total over unsigned usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CostEstimator
{   rates: CostRates
}

impl CostEstimator
{   pub fn new(rates: CostRates) -> Self
    {   CostEstimator
        {   rates
        }
    }

    /// Estimate cost in USD for the given usage
    pub fn estimate(&self, usage: &TokenUsage) -> f64
    {   usage.prompt_tokens as f64 * self.rates.prompt_per_1k / 1000.0
          + usage.completion_tokens as f64
            * self.rates.completion_per_1k / 1000.0
    }
}
