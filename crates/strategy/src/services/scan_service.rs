use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::error::normalize_symbol;
use futures_util::future::join_all;
use market_data::CandleSource;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::patterns;
use crate::scan::{ScanOutcome, ScanResult, SymbolScan};
use crate::scan_state::ScanState;

#[derive(Debug, Clone, Copy)]
pub struct ScannerSettings {
    /// Upper bound for one symbol's evaluation.
    pub eval_timeout: Duration,
    /// Candles requested per symbol.
    pub lookback: usize,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            eval_timeout: Duration::from_secs(5),
            lookback: 50,
        }
    }
}

#[derive(Clone)]
pub struct PatternScanner {
    source: Arc<dyn CandleSource>,
    state: Arc<ScanState>,
    settings: ScannerSettings,
}

impl PatternScanner {
    pub fn new(
        source: Arc<dyn CandleSource>,
        state: Arc<ScanState>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            source,
            state,
            settings,
        }
    }

    pub fn state(&self) -> &Arc<ScanState> {
        &self.state
    }

    /// Scans `universe` and publishes the result as the new last scan.
    pub async fn run_scan(&self, universe: &[String]) -> Arc<ScanResult> {
        let result = self.evaluate(universe).await;
        let failed = result.failures().count();
        if failed > 0 {
            warn!(
                "Scan finished with {}/{} failed symbols",
                failed,
                result.results.len()
            );
        }
        let snapshot = self.state.publish(result).await;
        info!(
            "Scan complete: {} symbols, {} patterns",
            snapshot.results.len(),
            snapshot
                .results
                .iter()
                .filter(|r| matches!(r.outcome, ScanOutcome::Pattern { .. }))
                .count()
        );
        snapshot
    }

    /// Evaluates every symbol concurrently without touching shared state.
    /// One record per input symbol, in input order. A symbol that errors,
    /// panics or exceeds the timeout gets an error record.
    pub async fn evaluate(&self, universe: &[String]) -> ScanResult {
        let tasks = universe.iter().map(|raw| {
            let raw = raw.clone();
            let source = self.source.clone();
            let settings = self.settings;
            async move {
                let symbol = match normalize_symbol(&raw) {
                    Ok(symbol) => symbol,
                    Err(e) => return SymbolScan::failed(raw, e),
                };

                let handle = tokio::spawn(evaluate_symbol(source, symbol.clone(), settings.lookback));
                let abort = handle.abort_handle();
                match timeout(settings.eval_timeout, handle).await {
                    Ok(Ok(Ok(outcome))) => SymbolScan { symbol, outcome },
                    Ok(Ok(Err(e))) => {
                        warn!("Evaluation failed for {}: {:#}", symbol, e);
                        SymbolScan::failed(symbol, format!("{:#}", e))
                    }
                    Ok(Err(join_err)) => {
                        warn!("Evaluation task for {} aborted: {}", symbol, join_err);
                        SymbolScan::failed(symbol, "evaluation panicked")
                    }
                    Err(_) => {
                        abort.abort();
                        warn!(
                            "Evaluation for {} exceeded {:?}",
                            symbol, settings.eval_timeout
                        );
                        SymbolScan::failed(symbol, "evaluation timed out")
                    }
                }
            }
        });

        let results = join_all(tasks).await;
        ScanResult {
            scanned_at: Utc::now(),
            results,
        }
    }
}

async fn evaluate_symbol(
    source: Arc<dyn CandleSource>,
    symbol: String,
    lookback: usize,
) -> anyhow::Result<ScanOutcome> {
    let candles = source.recent_candles(&symbol, lookback).await?;
    if candles.is_empty() {
        anyhow::bail!("no candles for {}", symbol);
    }

    Ok(match patterns::detect(&candles) {
        Some(found) => ScanOutcome::Pattern {
            pattern: found.kind.name().to_string(),
            bias: found.kind.bias(),
            confidence: found.confidence,
            price: found.price,
            verified: found.verified,
        },
        None => ScanOutcome::NoPattern {
            price: candles.last().map(|c| c.close),
        },
    })
}
