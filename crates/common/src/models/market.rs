use serde::{Deserialize, Serialize};

use super::detection::PatternBias;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternHint {
    pub name: String,
    pub bias: PatternBias,
    pub confidence: f64,
}

/// Market state handed to the signal generator. The generator never looks
/// anything up on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: f64,
    pub rsi: Option<f64>,
    pub pattern: Option<PatternHint>,
}

impl MarketSnapshot {
    pub fn at_price(price: f64) -> Self {
        Self {
            price,
            rsi: None,
            pattern: None,
        }
    }

    pub fn with_rsi(mut self, rsi: f64) -> Self {
        self.rsi = Some(rsi);
        self
    }

    pub fn with_pattern(mut self, pattern: PatternHint) -> Self {
        self.pattern = Some(pattern);
        self
    }
}
