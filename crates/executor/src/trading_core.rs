use std::sync::Arc;

use common::error::normalize_symbol;
use common::models::{Detection, MarketSnapshot, PatternHint, Signal};
use market_data::{CandleSource, PriceOracle, resolve_price};
use strategy::patterns;
use strategy::{PartialScanFailure, PatternScanner, ScanResult, SignalGenerator};
use tracing::debug;

use crate::error::SignalError;
use crate::services::ledger_service::PaperLedger;
use crate::services::scan_controller::ScanningController;

pub const DEFAULT_ALERT_LIMIT: usize = 50;

/// Everything a route layer needs, wired together.
pub struct TradingCore {
    ledger: Arc<PaperLedger>,
    controller: Arc<ScanningController>,
    scanner: PatternScanner,
    generator: SignalGenerator,
    oracle: Arc<dyn PriceOracle>,
    candles: Arc<dyn CandleSource>,
    universe: Vec<String>,
    fallback_price: Option<f64>,
    lookback: usize,
}

pub struct TradingCoreParts {
    pub ledger: Arc<PaperLedger>,
    pub controller: Arc<ScanningController>,
    pub scanner: PatternScanner,
    pub generator: SignalGenerator,
    pub oracle: Arc<dyn PriceOracle>,
    pub candles: Arc<dyn CandleSource>,
    pub universe: Vec<String>,
    pub fallback_price: Option<f64>,
    pub lookback: usize,
}

impl TradingCore {
    pub fn new(parts: TradingCoreParts) -> Self {
        Self {
            ledger: parts.ledger,
            controller: parts.controller,
            scanner: parts.scanner,
            generator: parts.generator,
            oracle: parts.oracle,
            candles: parts.candles,
            universe: parts.universe,
            fallback_price: parts.fallback_price,
            lookback: parts.lookback,
        }
    }

    pub fn ledger(&self) -> &PaperLedger {
        &self.ledger
    }

    pub fn controller(&self) -> &ScanningController {
        &self.controller
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    pub async fn price_of(&self, symbol: &str) -> Option<f64> {
        self.oracle.price_of(symbol).await
    }

    /// One-off scan over `universe`, or the configured one when `None`.
    pub async fn run_scan(&self, universe: Option<&[String]>) -> Arc<ScanResult> {
        self.scanner
            .run_scan(universe.unwrap_or(self.universe.as_slice()))
            .await
    }

    /// Scans a single symbol. Any detection joins the alert feed, but the
    /// universe's last scan stays as it was. Ids restart at `detection_0`
    /// per call.
    pub async fn detect(&self, symbol: &str) -> Result<Vec<Detection>, PartialScanFailure> {
        let result = self.scanner.evaluate(&[symbol.to_string()]).await;
        result.ensure_complete()?;
        let detections = result.detections();
        self.scanner
            .state()
            .record_alerts(detections.clone())
            .await;
        Ok(detections)
    }

    /// Newest alerts first; `None` means the default page size.
    pub async fn alerts(&self, limit: Option<usize>) -> Vec<Detection> {
        self.scanner
            .state()
            .recent_alerts(limit.unwrap_or(DEFAULT_ALERT_LIMIT))
            .await
    }

    /// Builds a snapshot from live data and runs the signal generator on it.
    pub async fn signal_for(
        &self,
        strategy: &str,
        symbol: &str,
        confidence_threshold: f64,
    ) -> Result<Signal, SignalError> {
        let symbol = normalize_symbol(symbol)?;
        let price = resolve_price(self.oracle.as_ref(), &symbol, self.fallback_price)
            .await
            .ok_or_else(|| SignalError::UpstreamUnavailable(symbol.clone()))?;

        let mut snapshot = MarketSnapshot::at_price(price);

        match self.candles.recent_candles(&symbol, self.lookback).await {
            Ok(candles) => {
                if let Some(rsi) = patterns::rsi(&candles) {
                    snapshot = snapshot.with_rsi(rsi);
                }
            }
            Err(e) => debug!("No candles for {} signal: {:#}", symbol, e),
        }

        if let Some(latest) = self.scanner.state().latest_for(&symbol).await {
            snapshot = snapshot.with_pattern(PatternHint {
                name: latest.pattern,
                bias: latest.bias,
                confidence: latest.confidence,
            });
        }

        Ok(self
            .generator
            .generate(strategy, &symbol, &snapshot, confidence_threshold)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use common::ValidationError;
    use common::models::{SignalAction, Side};
    use market_data::SimulatedMarket;
    use strategy::{ScanState, ScannerSettings};

    use crate::services::ledger_service::OpenRequest;

    async fn core_with(market: Arc<SimulatedMarket>, fallback: Option<f64>) -> TradingCore {
        let pool = storage::open_pool("sqlite::memory:").await.unwrap();
        let ledger = Arc::new(PaperLedger::new(pool, market.clone()).with_fallback_price(fallback));
        let scanner = PatternScanner::new(
            market.clone(),
            Arc::new(ScanState::new(100)),
            ScannerSettings::default(),
        );
        let universe: Vec<String> = vec!["BTC".into(), "ETH".into()];
        let controller = Arc::new(ScanningController::new(
            scanner.clone(),
            universe.clone(),
            Duration::from_secs(3600),
        ));

        TradingCore::new(TradingCoreParts {
            ledger,
            controller,
            scanner,
            generator: SignalGenerator::default(),
            oracle: market.clone(),
            candles: market,
            universe,
            fallback_price: fallback,
            lookback: 50,
        })
    }

    fn market() -> Arc<SimulatedMarket> {
        Arc::new(SimulatedMarket::seeded(&[("BTC", 93_500.0), ("ETH", 3_180.0)], 60, 42))
    }

    #[tokio::test]
    async fn test_signal_uses_live_price() {
        let market = market();
        let core = core_with(market.clone(), None).await;
        let live = market.price_of("BTC").await.unwrap();

        let signal = core.signal_for("default", "btc", 0.8).await.unwrap();
        assert_eq!(signal.symbol, "BTC");
        assert_eq!(signal.price, live);
        assert_eq!(signal.confidence_threshold, 0.8);
    }

    #[tokio::test]
    async fn test_signal_validation_and_missing_price() {
        let core = core_with(market(), None).await;
        assert_eq!(
            core.signal_for("default", "BTC", 1.5).await,
            Err(SignalError::Validation(ValidationError::ConfidenceOutOfRange(1.5)))
        );
        assert_eq!(
            core.signal_for("default", "DOGE", 0.5).await,
            Err(SignalError::UpstreamUnavailable("DOGE".to_string()))
        );

        let with_fallback = core_with(market(), Some(0.25)).await;
        let signal = with_fallback.signal_for("default", "DOGE", 0.5).await.unwrap();
        assert_eq!(signal.price, 0.25);
    }

    #[tokio::test]
    async fn test_detect_unknown_symbol_is_partial_failure() {
        let core = core_with(market(), None).await;
        let err = core.detect("DOGE").await.unwrap_err();
        assert_eq!(err.total, 1);
        assert_eq!(err.failed[0].0, "DOGE");
    }

    #[tokio::test]
    async fn test_scan_updates_controller_status() {
        let core = core_with(market(), None).await;
        let scan = core.run_scan(None).await;
        assert_eq!(scan.results.len(), 2);

        let status = core.controller().status().await;
        assert!(!status.scanning);
        assert!(Arc::ptr_eq(status.last_scan.as_ref().unwrap(), &scan));
        assert_eq!(status.active_alert_count, scan.detections().len());
        assert_eq!(core.alerts(None).await.len(), scan.detections().len());
    }

    #[tokio::test]
    async fn test_actionable_signal_opens_trade() {
        let core = core_with(market(), None).await;
        let mut signal = core.signal_for("aggressive", "ETH", 0.0).await.unwrap();
        signal.action = SignalAction::Buy;

        let trade = core
            .ledger()
            .open_from_signal(&signal, Some("alice".into()), 2.0)
            .await
            .unwrap();
        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.price, signal.price);

        let manual = core
            .ledger()
            .open(OpenRequest::new("ETH", Side::Sell, 1.0))
            .await
            .unwrap();
        let listed = core.ledger().list(Some("alice")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|t| t.id == manual.id));
    }

    #[tokio::test]
    async fn test_detect_keeps_universe_scan() {
        let core = core_with(market(), None).await;
        let scan = core.run_scan(None).await;
        let alerts_before = core.alerts(None).await.len();

        let found = core.detect("eth").await.unwrap();
        assert!(core.detect("DOGE").await.is_err());

        let status = core.controller().status().await;
        assert!(Arc::ptr_eq(status.last_scan.as_ref().unwrap(), &scan));
        assert_eq!(status.last_scan.unwrap().results.len(), 2);
        assert_eq!(core.alerts(None).await.len(), alerts_before + found.len());
        assert!(found.iter().all(|d| d.symbol == "ETH"));
    }
}
