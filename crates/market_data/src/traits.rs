use async_trait::async_trait;
use common::models::Candle;

/// Best-known current price for a symbol. `None` means "no data", never a
/// zero price.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn price_of(&self, symbol: &str) -> Option<f64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Up to `limit` most recent candles, oldest first.
    async fn recent_candles(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<Candle>>;
}

/// Filters out values that cannot be used as a fill price.
pub fn usable_price(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

/// Oracle price first, then the caller's fallback.
pub async fn resolve_price(
    oracle: &dyn PriceOracle,
    symbol: &str,
    fallback: Option<f64>,
) -> Option<f64> {
    usable_price(oracle.price_of(symbol).await).or(usable_price(fallback))
}
