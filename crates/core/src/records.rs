//! Domain records shared by ingestion, storage and aggregation.
//!
//! All timestamps are UTC. Ticks and posts carry second precision; aggregate
//! timestamps are floored to the minute.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped price observation from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Observation time (second precision)
    pub timestamp: DateTime<Utc>,
    /// Product identifier (e.g., "BTC-USD")
    pub symbol: String,
    /// Last traded price
    pub price: f64,
    /// Trade size, 0 when the feed did not report one
    pub volume: f64,
}

impl Tick {
    /// Creates a tick, truncating the timestamp to whole seconds.
    pub fn new(
        timestamp: DateTime<Utc>,
        symbol: impl Into<String>,
        price: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp: truncate_to_second(timestamp),
            symbol: symbol.into(),
            price,
            volume,
        }
    }
}

/// A scored social-media post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Globally unique post ID
    pub id: String,
    /// Source label (e.g., the subreddit)
    pub source: String,
    /// Post body used for keyword attribution
    pub text: String,
    /// Compound sentiment score in [-1, 1]
    pub sentiment: f64,
    /// Creation time (second precision)
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Creates a post, truncating the creation time to whole seconds.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        text: impl Into<String>,
        sentiment: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            text: text.into(),
            sentiment,
            created_at: truncate_to_second(created_at),
        }
    }
}

/// Per-minute, per-symbol summary row.
///
/// Keyed by `(minute, symbol)`; at most one row exists per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Minute bucket (floored)
    pub minute: DateTime<Utc>,
    pub symbol: String,
    /// Mean sentiment of the attributed posts, `None` when no posts were found
    pub avg_sentiment: Option<f64>,
    pub post_count: i64,
    pub open_price: f64,
    pub close_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub volume: f64,
    pub price_change_pct: f64,
}

/// Result of an insert-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsertOutcome {
    /// A new row was written
    Inserted,
    /// A row with the same key already existed; nothing was written
    Skipped,
}

impl InsertOutcome {
    /// Returns true if a row was written.
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Floors a timestamp to the start of its minute.
#[must_use]
pub fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts)
}

/// Drops sub-second precision.
#[must_use]
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

/// Returns the `count` minute buckets ending at (and including) the minute of
/// `latest`, oldest first.
#[must_use]
pub fn trailing_minutes(latest: DateTime<Utc>, count: u32) -> Vec<DateTime<Utc>> {
    let last = floor_to_minute(latest);
    (0..i64::from(count))
        .rev()
        .map(|i| last - Duration::minutes(i))
        .collect()
}
