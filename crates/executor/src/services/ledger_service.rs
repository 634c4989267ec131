use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use common::error::normalize_symbol;
use common::models::{Side, Signal, Trade};
use common::{Clock, SystemClock, ValidationError};
use market_data::{PriceOracle, resolve_price};
use serde::Serialize;
use sqlx::SqlitePool;
use storage::TradeRepository;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub user_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    /// Filled from the price oracle when absent.
    pub price: Option<f64>,
}

impl OpenRequest {
    pub fn new(symbol: impl Into<String>, side: Side, quantity: f64) -> Self {
        Self {
            user_id: None,
            symbol: symbol.into(),
            side,
            quantity,
            price: None,
        }
    }

    pub fn at_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total_trades: usize,
    pub open_positions: usize,
    pub closed_trades: usize,
    pub total_pnl: f64,
    /// Percentage of closed trades with positive PnL.
    pub win_rate: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_trade: f64,
    pub balance: f64,
}

/// Paper-trading position ledger backed by the `paper_trades` table.
/// Every mutation is committed before the call returns.
pub struct PaperLedger {
    pool: SqlitePool,
    oracle: Arc<dyn PriceOracle>,
    clock: Arc<dyn Clock>,
    fallback_price: Option<f64>,
    starting_balance: f64,
}

impl PaperLedger {
    pub fn new(pool: SqlitePool, oracle: Arc<dyn PriceOracle>) -> Self {
        Self {
            pool,
            oracle,
            clock: Arc::new(SystemClock),
            fallback_price: None,
            starting_balance: 10_000.0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fallback_price(mut self, price: Option<f64>) -> Self {
        self.fallback_price = price;
        self
    }

    pub fn with_starting_balance(mut self, balance: f64) -> Self {
        self.starting_balance = balance;
        self
    }

    pub async fn open(&self, request: OpenRequest) -> Result<Trade, LedgerError> {
        if !request.quantity.is_finite() || request.quantity <= 0.0 {
            return Err(ValidationError::NonPositiveQuantity(request.quantity).into());
        }
        let symbol = normalize_symbol(&request.symbol)?;
        let price = self.fill_price(&symbol, request.price).await?;

        let trade = Trade {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.filter(|u| !u.trim().is_empty()),
            symbol,
            side: request.side,
            quantity: request.quantity,
            price,
            opened_at: self.now(),
            close_price: None,
            closed_at: None,
        };

        TradeRepository::insert(&self.pool, &trade).await?;
        info!(
            "Opened paper trade {} {} {} x{} @ {}",
            trade.id, trade.side, trade.symbol, trade.quantity, trade.price
        );
        Ok(trade)
    }

    /// Opens a trade in the direction of `signal` at the signal's price.
    pub async fn open_from_signal(
        &self,
        signal: &Signal,
        user_id: Option<String>,
        quantity: f64,
    ) -> Result<Trade, LedgerError> {
        let side = signal
            .action
            .side()
            .ok_or_else(|| ValidationError::NonActionableSignal(signal.symbol.clone()))?;

        self.open(OpenRequest {
            user_id,
            symbol: signal.symbol.clone(),
            side,
            quantity,
            price: Some(signal.price),
        })
        .await
    }

    /// Closes an open trade at `price`, or at the live price when absent.
    ///
    /// A trade closes exactly once. Later calls fail with `AlreadyClosed`
    /// holding the stored trade, untouched.
    pub async fn close(&self, trade_id: &str, price: Option<f64>) -> Result<Trade, LedgerError> {
        let existing = TradeRepository::find(&self.pool, trade_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))?;
        if !existing.is_open() {
            return Err(LedgerError::AlreadyClosed(Box::new(existing)));
        }

        let close_price = self.fill_price(&existing.symbol, price).await?;
        let updated =
            TradeRepository::close(&self.pool, trade_id, close_price, self.now()).await?;

        let stored = TradeRepository::find(&self.pool, trade_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))?;

        if !updated {
            warn!("Trade {} was closed concurrently", trade_id);
            return Err(LedgerError::AlreadyClosed(Box::new(stored)));
        }

        info!(
            "Closed paper trade {} @ {} (pnl {:.4})",
            stored.id,
            close_price,
            stored.pnl().unwrap_or_default()
        );
        Ok(stored)
    }

    pub async fn get(&self, trade_id: &str) -> Result<Trade, LedgerError> {
        TradeRepository::find(&self.pool, trade_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))
    }

    /// Newest-opened first. A user scope also includes trades without owner.
    pub async fn list(&self, user_id: Option<&str>) -> Result<Vec<Trade>, LedgerError> {
        let user_id = user_id.map(str::trim).filter(|u| !u.is_empty());
        Ok(TradeRepository::list(&self.pool, user_id).await?)
    }

    pub async fn portfolio_stats(&self, user_id: Option<&str>) -> Result<PortfolioStats, LedgerError> {
        let trades = self.list(user_id).await?;
        Ok(summarize(&trades, self.starting_balance))
    }

    async fn fill_price(&self, symbol: &str, explicit: Option<f64>) -> Result<f64, LedgerError> {
        match explicit {
            Some(price) if price.is_finite() && price > 0.0 => Ok(price),
            Some(price) => Err(ValidationError::InvalidPrice(price).into()),
            None => resolve_price(self.oracle.as_ref(), symbol, self.fallback_price)
                .await
                .ok_or_else(|| LedgerError::UpstreamUnavailable(symbol.to_string())),
        }
    }

    /// Current time at the millisecond precision the store keeps.
    fn now(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        Utc.timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now)
    }
}

fn summarize(trades: &[Trade], starting_balance: f64) -> PortfolioStats {
    let realized: Vec<f64> = trades.iter().filter_map(Trade::pnl).collect();
    let closed = realized.len();
    let total_pnl: f64 = realized.iter().sum();
    let wins = realized.iter().filter(|p| **p > 0.0).count();

    let (win_rate, best, worst, avg) = if closed == 0 {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (
            wins as f64 / closed as f64 * 100.0,
            realized.iter().copied().fold(f64::MIN, f64::max),
            realized.iter().copied().fold(f64::MAX, f64::min),
            total_pnl / closed as f64,
        )
    };

    PortfolioStats {
        total_trades: trades.len(),
        open_positions: trades.iter().filter(|t| t.is_open()).count(),
        closed_trades: closed,
        total_pnl,
        win_rate,
        best_trade: best,
        worst_trade: worst,
        avg_trade: avg,
        balance: starting_balance + total_pnl,
    }
}
