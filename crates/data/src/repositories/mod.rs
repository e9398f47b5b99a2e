//! Database repositories for the market pulse store.
//!
//! Each repository provides typed access to one table. `Repositories`
//! bundles them behind the `MarketStore` trait.

pub mod aggregate_repo;
pub mod post_repo;
pub mod tick_repo;

pub use aggregate_repo::AggregateRepository;
pub use post_repo::PostRepository;
pub use tick_repo::TickRepository;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_pulse_core::{Aggregate, InsertOutcome, MarketStore, Post, Tick};
use serde::Serialize;
use sqlx::SqlitePool;

/// Row counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub ticks: i64,
    pub posts: i64,
    pub aggregates: i64,
}

/// Creates all repositories from a single database pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub ticks: TickRepository,
    pub posts: PostRepository,
    pub aggregates: AggregateRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            ticks: TickRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            aggregates: AggregateRepository::new(pool),
        }
    }

    /// Counts rows in every table.
    ///
    /// # Errors
    /// Returns an error if any count query fails.
    pub async fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            ticks: self.ticks.count().await?,
            posts: self.posts.count().await?,
            aggregates: self.aggregates.count().await?,
        })
    }
}

#[async_trait]
impl MarketStore for Repositories {
    async fn insert_tick(&self, tick: &Tick) -> Result<()> {
        self.ticks.insert(tick).await
    }

    async fn insert_post(&self, post: &Post) -> Result<InsertOutcome> {
        self.posts.insert(post).await
    }

    async fn query_ticks(
        &self,
        symbol: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Tick>> {
        self.ticks.query_by_time_range(symbol, from, to).await
    }

    async fn latest_tick_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.ticks.latest_timestamp().await
    }

    async fn query_posts(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Post>> {
        self.posts.query_by_time_range(from, to).await
    }

    async fn latest_post_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.posts.latest_timestamp().await
    }

    async fn insert_aggregate_if_absent(&self, row: &Aggregate) -> Result<InsertOutcome> {
        self.aggregates.insert_if_absent(row).await
    }
}
