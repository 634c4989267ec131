use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use common::models::Candle;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::traits::{CandleSource, PriceOracle, usable_price};

pub const DEFAULT_SEEDS: &[(&str, f64); 3] = &[("BTC", 93_500.0), ("ETH", 3_180.0), ("SOL", 150.0)];

const MAX_STEP_PCT: f64 = 0.006;
const MAX_WICK_PCT: f64 = 0.003;

struct SymbolTape {
    candles: VecDeque<Candle>,
}

struct MarketInner {
    rng: StdRng,
    tapes: HashMap<String, SymbolTape>,
    capacity: usize,
    bar: ChronoDuration,
}

/// Random-walk market standing in for a live feed. Serves both prices and
/// candles so the scanner and the ledger see the same numbers.
pub struct SimulatedMarket {
    inner: Mutex<MarketInner>,
}

impl SimulatedMarket {
    pub fn new(seeds: &[(&str, f64)], history: usize) -> Self {
        Self::with_rng(seeds, history, StdRng::from_entropy())
    }

    /// Reproducible tape, handy for tests.
    pub fn seeded(seeds: &[(&str, f64)], history: usize, seed: u64) -> Self {
        Self::with_rng(seeds, history, StdRng::seed_from_u64(seed))
    }

    fn with_rng(seeds: &[(&str, f64)], history: usize, rng: StdRng) -> Self {
        let capacity = history.max(1);
        let bar = ChronoDuration::minutes(1);
        let start = Utc::now() - bar * capacity as i32;

        let mut inner = MarketInner {
            rng,
            tapes: HashMap::new(),
            capacity,
            bar,
        };

        for (symbol, price) in seeds {
            let mut tape = SymbolTape {
                candles: VecDeque::with_capacity(capacity),
            };
            let mut last_close = *price;
            for i in 0..capacity {
                let candle = next_candle(&mut inner.rng, last_close, start + bar * i as i32);
                last_close = candle.close;
                tape.candles.push_back(candle);
            }
            inner.tapes.insert(symbol.to_uppercase(), tape);
        }

        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Appends one bar to every symbol.
    pub fn step(&self) {
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        let inner = &mut *guard;
        let capacity = inner.capacity;
        let bar = inner.bar;

        for tape in inner.tapes.values_mut() {
            let Some(last) = tape.candles.back() else {
                continue;
            };
            let open_time = last.open_time + bar;
            let candle = next_candle(&mut inner.rng, last.close, open_time);
            if tape.candles.len() == capacity {
                tape.candles.pop_front();
            }
            tape.candles.push_back(candle);
        }
    }

    /// Steps the tape on a timer until the handle is aborted.
    pub fn spawn_ticker(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.step();
                debug!("Simulated market advanced one bar");
            }
        })
    }

    pub fn symbols(&self) -> Vec<String> {
        match self.inner.lock() {
            Ok(inner) => {
                let mut symbols: Vec<String> = inner.tapes.keys().cloned().collect();
                symbols.sort();
                symbols
            }
            Err(_) => Vec::new(),
        }
    }

    fn last_close(&self, symbol: &str) -> Option<f64> {
        let inner = self.inner.lock().ok()?;
        inner
            .tapes
            .get(&symbol.to_uppercase())
            .and_then(|t| t.candles.back())
            .map(|c| c.close)
    }
}

fn next_candle(rng: &mut StdRng, prev_close: f64, open_time: DateTime<Utc>) -> Candle {
    let open = prev_close;
    let close = (open * (1.0 + rng.gen_range(-MAX_STEP_PCT..=MAX_STEP_PCT))).max(0.0001);
    let high = open.max(close) * (1.0 + rng.gen_range(0.0..=MAX_WICK_PCT));
    let low = open.min(close) * (1.0 - rng.gen_range(0.0..=MAX_WICK_PCT));
    Candle {
        open_time,
        open,
        high,
        low,
        close,
        volume: rng.gen_range(100.0..1_000.0),
    }
}

#[async_trait]
impl PriceOracle for SimulatedMarket {
    async fn price_of(&self, symbol: &str) -> Option<f64> {
        usable_price(self.last_close(symbol))
    }
}

#[async_trait]
impl CandleSource for SimulatedMarket {
    async fn recent_candles(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<Candle>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("simulated market state is poisoned"))?;

        let Some(tape) = inner.tapes.get(&symbol.to_uppercase()) else {
            bail!("no market data for {}", symbol);
        };

        let skip = tape.candles.len().saturating_sub(limit);
        Ok(tape.candles.iter().skip(skip).cloned().collect())
    }
}
