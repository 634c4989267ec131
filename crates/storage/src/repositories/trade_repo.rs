use chrono::{DateTime, TimeZone, Utc};
use common::models::{Side, Trade};
use sqlx::{FromRow, SqlitePool};

pub struct TradeRepository;

#[derive(Debug, FromRow)]
struct TradeRow {
    id: String,
    user_id: Option<String>,
    symbol: String,
    side: String,
    qty: f64,
    price: f64,
    opened_at: i64,
    close_price: Option<f64>,
    closed_at: Option<i64>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = sqlx::Error;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let side = row
            .side
            .parse::<Side>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Trade {
            id: row.id,
            user_id: row.user_id,
            symbol: row.symbol,
            side,
            quantity: row.qty,
            price: row.price,
            opened_at: from_millis(row.opened_at)?,
            close_price: row.close_price,
            closed_at: row.closed_at.map(from_millis).transpose()?,
        })
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| sqlx::Error::Decode(format!("invalid timestamp {}", millis).into()))
}

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, symbol, side, qty, price, opened_at, close_price, closed_at FROM paper_trades";

impl TradeRepository {
    pub async fn insert(pool: &SqlitePool, trade: &Trade) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO paper_trades (
                    id, user_id, symbol, side, qty, price, opened_at, close_price, closed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.id)
        .bind(trade.user_id.as_deref())
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.opened_at.timestamp_millis())
        .bind(trade.close_price)
        .bind(trade.closed_at.map(|t| t.timestamp_millis()))
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Trade>, sqlx::Error> {
        let row = sqlx::query_as::<_, TradeRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(Trade::try_from).transpose()
    }

    /// Closes an open trade. Returns `false` when nothing was updated, either
    /// because the id is unknown or because another caller closed it first.
    pub async fn close(
        pool: &SqlitePool,
        id: &str,
        close_price: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
                UPDATE paper_trades
                SET close_price = ?, closed_at = MAX(?, opened_at)
                WHERE id = ? AND closed_at IS NULL
            "#,
        )
        .bind(close_price)
        .bind(closed_at.timestamp_millis())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Newest-opened first. A user scope also matches trades without owner.
    pub async fn list(
        pool: &SqlitePool,
        user_id: Option<&str>,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, TradeRow>(&format!(
                    "{} WHERE user_id = ? OR user_id IS NULL ORDER BY opened_at DESC, rowid DESC",
                    SELECT_COLUMNS
                ))
                .bind(user_id)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TradeRow>(&format!(
                    "{} ORDER BY opened_at DESC, rowid DESC",
                    SELECT_COLUMNS
                ))
                .fetch_all(pool)
                .await?
            }
        };

        rows.into_iter().map(Trade::try_from).collect()
    }
}
