use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::traits::{PriceOracle, usable_price};

/// In-memory last-price table, keyed by upper-cased symbol.
#[derive(Debug, Default)]
pub struct PriceBook {
    prices: RwLock<HashMap<String, f64>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: RwLock::new(
                prices
                    .iter()
                    .map(|(s, p)| (s.to_uppercase(), *p))
                    .collect(),
            ),
        }
    }

    pub async fn set(&self, symbol: &str, price: f64) {
        self.prices.write().await.insert(symbol.to_uppercase(), price);
    }

    pub async fn remove(&self, symbol: &str) -> Option<f64> {
        self.prices.write().await.remove(&symbol.to_uppercase())
    }
}

#[async_trait]
impl PriceOracle for PriceBook {
    async fn price_of(&self, symbol: &str) -> Option<f64> {
        let prices = self.prices.read().await;
        usable_price(prices.get(&symbol.to_uppercase()).copied())
    }
}
