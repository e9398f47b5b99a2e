use crate::records::{Aggregate, InsertOutcome, Post, Tick};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable store for ticks, posts and aggregates.
///
/// Every call is independently atomic; no operation spans several rows in a
/// transaction. Time ranges are half-open: `[from, to)`.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn insert_tick(&self, tick: &Tick) -> Result<()>;

    /// Inserts a post unless one with the same ID exists.
    ///
    /// Returns `Skipped` for a duplicate ID.
    async fn insert_post(&self, post: &Post) -> Result<InsertOutcome>;

    /// Ticks in range ordered by timestamp, optionally for one symbol.
    async fn query_ticks(
        &self,
        symbol: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Tick>>;

    async fn latest_tick_timestamp(&self) -> Result<Option<DateTime<Utc>>>;

    /// Posts in range ordered by creation time.
    async fn query_posts(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Post>>;

    async fn latest_post_timestamp(&self) -> Result<Option<DateTime<Utc>>>;

    /// Writes the row only if `(minute, symbol)` is not present yet.
    ///
    /// A key conflict is `Ok(Skipped)`, never an error.
    async fn insert_aggregate_if_absent(&self, row: &Aggregate) -> Result<InsertOutcome>;
}

/// Pure text → compound score function.
pub trait SentimentScorer: Send + Sync {
    /// Returns a score in [-1.0, 1.0].
    fn score(&self, text: &str) -> f64;
}
