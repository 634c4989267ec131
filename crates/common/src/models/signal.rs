use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::trade::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    pub fn side(&self) -> Option<Side> {
        match self {
            SignalAction::Buy => Some(Side::Buy),
            SignalAction::Sell => Some(Side::Sell),
            SignalAction::Hold => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub strategy: String,
    pub symbol: String,
    pub price: f64,
    pub confidence_threshold: f64,
    pub action: SignalAction,
    pub confidence: f64,
    pub reason: String,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
