//! Minute aggregate repository.
//!
//! Rows are keyed by `(ts, symbol)`. A row is written once and never
//! updated; later writes for the same key are skipped.

use anyhow::Result;
use market_pulse_core::{Aggregate, InsertOutcome};
use sqlx::{FromRow, SqlitePool};

use crate::database::from_epoch;

#[derive(Debug, FromRow)]
struct AggregateRow {
    ts: i64,
    symbol: String,
    avg_sentiment: Option<f64>,
    post_count: i64,
    open_price: f64,
    close_price: f64,
    high_price: f64,
    low_price: f64,
    volume: f64,
    price_change_pct: f64,
}

impl TryFrom<AggregateRow> for Aggregate {
    type Error = anyhow::Error;

    fn try_from(row: AggregateRow) -> Result<Self> {
        Ok(Aggregate {
            minute: from_epoch(row.ts)?,
            symbol: row.symbol,
            avg_sentiment: row.avg_sentiment,
            post_count: row.post_count,
            open_price: row.open_price,
            close_price: row.close_price,
            high_price: row.high_price,
            low_price: row.low_price,
            volume: row.volume,
            price_change_pct: row.price_change_pct,
        })
    }
}

/// Repository for aggregate operations.
#[derive(Debug, Clone)]
pub struct AggregateRepository {
    pool: SqlitePool,
}

impl AggregateRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Writes the row if `(minute, symbol)` is not stored yet.
    ///
    /// # Errors
    /// Returns an error if the database operation fails. A key conflict is
    /// reported as `InsertOutcome::Skipped`.
    pub async fn insert_if_absent(&self, row: &Aggregate) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO aggregates
                (ts, symbol, avg_sentiment, post_count, open_price, close_price,
                 high_price, low_price, volume, price_change_pct)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (ts, symbol) DO NOTHING
            "#,
        )
        .bind(row.minute.timestamp())
        .bind(&row.symbol)
        .bind(row.avg_sentiment)
        .bind(row.post_count)
        .bind(row.open_price)
        .bind(row.close_price)
        .bind(row.high_price)
        .bind(row.low_price)
        .bind(row.volume)
        .bind(row.price_change_pct)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::Skipped
        } else {
            InsertOutcome::Inserted
        })
    }

    /// Returns the newest rows first, optionally for one symbol.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_recent(&self, symbol: Option<&str>, limit: u32) -> Result<Vec<Aggregate>> {
        let rows = sqlx::query_as::<_, AggregateRow>(
            r#"
            SELECT ts, symbol, avg_sentiment, post_count, open_price, close_price,
                   high_price, low_price, volume, price_change_pct
            FROM aggregates
            WHERE (?1 IS NULL OR symbol = ?1)
            ORDER BY ts DESC, symbol ASC
            LIMIT ?2
            "#,
        )
        .bind(symbol)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Aggregate::try_from).collect()
    }

    /// Counts stored aggregate rows.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM aggregates")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
