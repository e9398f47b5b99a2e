//! Tick repository.
//!
//! Append-only storage for raw feed observations in the `tickers` table.

use anyhow::Result;
use chrono::{DateTime, Utc};
use market_pulse_core::Tick;
use sqlx::{FromRow, SqlitePool};

use crate::database::from_epoch;

#[derive(Debug, FromRow)]
struct TickRow {
    symbol: String,
    price: f64,
    volume: f64,
    ts: i64,
}

impl TryFrom<TickRow> for Tick {
    type Error = anyhow::Error;

    fn try_from(row: TickRow) -> Result<Self> {
        Ok(Tick {
            timestamp: from_epoch(row.ts)?,
            symbol: row.symbol,
            price: row.price,
            volume: row.volume,
        })
    }
}

/// Repository for tick operations.
#[derive(Debug, Clone)]
pub struct TickRepository {
    pool: SqlitePool,
}

impl TickRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a tick.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, tick: &Tick) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tickers (symbol, price, volume, ts)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&tick.symbol)
        .bind(tick.price)
        .bind(tick.volume)
        .bind(tick.timestamp.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Queries ticks in `[start, end)`, oldest first, optionally for one symbol.
    ///
    /// Ticks sharing a second keep their arrival order.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_by_time_range(
        &self,
        symbol: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Tick>> {
        let rows = sqlx::query_as::<_, TickRow>(
            r#"
            SELECT symbol, price, volume, ts
            FROM tickers
            WHERE ts >= ?1 AND ts < ?2
              AND (?3 IS NULL OR symbol = ?3)
            ORDER BY ts ASC, id ASC
            "#,
        )
        .bind(start.timestamp())
        .bind(end.timestamp())
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Tick::try_from).collect()
    }

    /// Returns the timestamp of the newest tick, if any.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(ts) FROM tickers")
            .fetch_one(&self.pool)
            .await?;

        latest.map(from_epoch).transpose()
    }

    /// Counts stored ticks.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
