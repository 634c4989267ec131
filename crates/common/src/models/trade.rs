use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(ValidationError::InvalidSide(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// A paper position. Closing is the only mutation it ever sees.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: String,
    pub user_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    /// Fill price at open.
    pub price: f64,
    pub opened_at: DateTime<Utc>,
    pub close_price: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn status(&self) -> TradeStatus {
        match self.closed_at {
            Some(_) => TradeStatus::Closed,
            None => TradeStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    /// Realized PnL, only defined once the trade is closed.
    pub fn pnl(&self) -> Option<f64> {
        let close_price = self.close_price?;
        self.closed_at?;
        Some((close_price - self.price) * self.quantity * self.side.sign())
    }

    /// Mark-to-market PnL of an open trade against `mark`.
    pub fn unrealized_pnl(&self, mark: f64) -> Option<f64> {
        if self.is_open() {
            Some((mark - self.price) * self.quantity * self.side.sign())
        } else {
            None
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TradeRecord<'a> {
    id: &'a str,
    user_id: Option<&'a str>,
    symbol: &'a str,
    side: Side,
    quantity: f64,
    price: f64,
    opened_at: DateTime<Utc>,
    close_price: Option<f64>,
    closed_at: Option<DateTime<Utc>>,
    status: TradeStatus,
    pnl: Option<f64>,
}

impl Serialize for Trade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TradeRecord {
            id: &self.id,
            user_id: self.user_id.as_deref(),
            symbol: &self.symbol,
            side: self.side,
            quantity: self.quantity,
            price: self.price,
            opened_at: self.opened_at,
            close_price: self.close_price,
            closed_at: self.closed_at,
            status: self.status(),
            pnl: self.pnl(),
        }
        .serialize(serializer)
    }
}
