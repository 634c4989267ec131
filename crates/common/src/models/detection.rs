use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternBias {
    Bullish,
    Bearish,
    Neutral,
}

/// One detected pattern. The id only means something inside the scan that
/// produced it (`detection_{position}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: String,
    pub symbol: String,
    pub pattern: String,
    pub bias: PatternBias,
    pub confidence: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Momentum agreed with the pattern direction.
    pub verified: bool,
}

impl Detection {
    pub fn id_for(position: usize) -> String {
        format!("detection_{}", position)
    }
}
