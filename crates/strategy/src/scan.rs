use chrono::{DateTime, Utc};
use common::models::{Detection, PatternBias};
use serde::Serialize;
use thiserror::Error;

/// Outcome of evaluating one symbol. Serializes with a `status` tag of
/// `pattern`, `no-pattern` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ScanOutcome {
    Pattern {
        pattern: String,
        bias: PatternBias,
        confidence: f64,
        price: f64,
        verified: bool,
    },
    NoPattern {
        #[serde(skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolScan {
    pub symbol: String,
    #[serde(flatten)]
    pub outcome: ScanOutcome,
}

impl SymbolScan {
    pub fn failed(symbol: impl Into<String>, error: impl ToString) -> Self {
        Self {
            symbol: symbol.into(),
            outcome: ScanOutcome::Error {
                error: error.to_string(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scanned_at: DateTime<Utc>,
    /// Same order as the universe that was scanned.
    pub results: Vec<SymbolScan>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} of {total} symbols failed evaluation", failed.len())]
pub struct PartialScanFailure {
    /// `(symbol, error)` pairs.
    pub failed: Vec<(String, String)>,
    pub total: usize,
}

impl ScanResult {
    /// Pattern records as detections. Ids follow the position among the
    /// detections of this scan, so they restart at `detection_0` every run.
    pub fn detections(&self) -> Vec<Detection> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                ScanOutcome::Pattern {
                    pattern,
                    bias,
                    confidence,
                    price,
                    verified,
                } => Some((r.symbol.as_str(), pattern, *bias, *confidence, *price, *verified)),
                _ => None,
            })
            .enumerate()
            .map(
                |(pos, (symbol, pattern, bias, confidence, price, verified))| Detection {
                    id: Detection::id_for(pos),
                    symbol: symbol.to_string(),
                    pattern: pattern.clone(),
                    bias,
                    confidence,
                    price,
                    timestamp: self.scanned_at,
                    verified,
                },
            )
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SymbolScan> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Turns failure markers into an error for callers that need every
    /// symbol evaluated.
    pub fn ensure_complete(&self) -> Result<(), PartialScanFailure> {
        let failed: Vec<(String, String)> = self
            .results
            .iter()
            .filter_map(|r| match &r.outcome {
                ScanOutcome::Error { error } => Some((r.symbol.clone(), error.clone())),
                _ => None,
            })
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(PartialScanFailure {
                failed,
                total: self.results.len(),
            })
        }
    }
}
