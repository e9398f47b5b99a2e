//! End-to-end aggregation behavior against an in-memory SQLite store.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use market_pulse_aggregator::{AggregationEngine, CycleReport};
use market_pulse_core::{Aggregate, AggregatorConfig, InsertOutcome, MarketStore, Post, Tick};
use market_pulse_data::{DatabaseClient, Repositories};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn at(min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 29, 12, min, sec).unwrap()
}

fn config(trailing: u32, fallback: u32) -> AggregatorConfig {
    AggregatorConfig {
        trailing_minutes: trailing,
        fallback_minutes: fallback,
        ..AggregatorConfig::default()
    }
}

async fn store() -> Repositories {
    DatabaseClient::connect_in_memory()
        .await
        .unwrap()
        .repositories()
}

async fn add_ticks(repos: &Repositories, symbol: &str, ticks: &[(u32, u32, f64)]) {
    for (min, sec, price) in ticks {
        repos
            .insert_tick(&Tick::new(at(*min, *sec), symbol, *price, 1.0))
            .await
            .unwrap();
    }
}

async fn add_post(repos: &Repositories, id: &str, text: &str, sentiment: f64, ts: DateTime<Utc>) {
    repos
        .insert_post(&Post::new(id, "test", text, sentiment, ts))
        .await
        .unwrap();
}

async fn rows(repos: &Repositories, symbol: &str) -> Vec<Aggregate> {
    repos.aggregates.query_recent(Some(symbol), 100).await.unwrap()
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_second_run_inserts_nothing() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(0, 1, 100.0), (0, 30, 101.0)]).await;
    add_ticks(&repos, "ETH-USD", &[(0, 2, 3000.0)]).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(6, 5));

    let first = engine.run_once().await.unwrap();
    let second = engine.run_once().await.unwrap();

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(repos.aggregates.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_late_tick_does_not_rewrite_row() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(0, 1, 100.0)]).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(6, 5));
    engine.run_once().await.unwrap();

    add_ticks(&repos, "BTC-USD", &[(0, 50, 200.0)]).await;
    engine.run_once().await.unwrap();

    let stored = rows(&repos, "BTC-USD").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].close_price, 100.0);
}

// ============================================================================
// OHLC
// ============================================================================

#[tokio::test]
async fn test_ohlc_from_stored_ticks() {
    let repos = store().await;
    add_ticks(
        &repos,
        "X",
        &[(3, 5, 100.0), (3, 20, 105.0), (3, 40, 98.0), (3, 55, 102.0)],
    )
    .await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(1, 0));

    engine.run_once().await.unwrap();

    let row = &rows(&repos, "X").await[0];
    assert_eq!(row.minute, at(3, 0));
    assert_eq!(row.open_price, 100.0);
    assert_eq!(row.close_price, 102.0);
    assert_eq!(row.high_price, 105.0);
    assert_eq!(row.low_price, 98.0);
    assert_eq!(row.volume, 4.0);
    assert!((row.price_change_pct - 2.0).abs() < 1e-9);
}

// ============================================================================
// Sentiment
// ============================================================================

#[tokio::test]
async fn test_fallback_window_used_when_minute_has_no_posts() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(10, 5, 100.0)]).await;
    add_post(&repos, "a", "bitcoin up", 0.5, at(7, 0)).await;
    add_post(&repos, "b", "btc flat", -0.1, at(9, 59)).await;
    // outside a 5 minute lookback
    add_post(&repos, "c", "btc ancient", 1.0, at(4, 59)).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(1, 5));

    engine.run_once().await.unwrap();

    let row = &rows(&repos, "BTC-USD").await[0];
    assert_eq!(row.post_count, 2);
    assert!((row.avg_sentiment.unwrap() - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_exact_window_preferred_over_fallback() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(10, 5, 100.0)]).await;
    add_post(&repos, "old", "btc", -1.0, at(8, 0)).await;
    add_post(&repos, "now", "btc", 0.4, at(10, 30)).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(1, 5));

    engine.run_once().await.unwrap();

    let row = &rows(&repos, "BTC-USD").await[0];
    assert_eq!(row.post_count, 1);
    assert_eq!(row.avg_sentiment, Some(0.4));
}

#[tokio::test]
async fn test_zero_fallback_depth_leaves_sentiment_null() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(10, 5, 100.0)]).await;
    add_post(&repos, "old", "btc", 0.9, at(9, 0)).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(1, 0));

    engine.run_once().await.unwrap();

    let row = &rows(&repos, "BTC-USD").await[0];
    assert_eq!(row.avg_sentiment, None);
    assert_eq!(row.post_count, 0);
}

#[tokio::test]
async fn test_keyword_attribution_and_global_fallback() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(2, 1, 100.0)]).await;
    add_ticks(&repos, "ETH-USD", &[(2, 2, 3000.0)]).await;
    add_post(&repos, "p1", "eth staking is great", 0.8, at(2, 10)).await;
    add_post(&repos, "p2", "markets are quiet", -0.2, at(2, 20)).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(1, 5));

    engine.run_once().await.unwrap();

    let eth = &rows(&repos, "ETH-USD").await[0];
    assert_eq!(eth.post_count, 1);
    assert_eq!(eth.avg_sentiment, Some(0.8));

    // no BTC keyword match: global average, including the ETH post
    let btc = &rows(&repos, "BTC-USD").await[0];
    assert_eq!(btc.post_count, 2);
    assert!((btc.avg_sentiment.unwrap() - 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_symbol_without_keyword_list_uses_global_posts() {
    let repos = store().await;
    add_ticks(&repos, "SOL-USD", &[(2, 1, 20.0)]).await;
    add_post(&repos, "p1", "btc", 0.6, at(2, 10)).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(1, 0));

    engine.run_once().await.unwrap();

    let sol = &rows(&repos, "SOL-USD").await[0];
    assert_eq!(sol.post_count, 1);
    assert_eq!(sol.avg_sentiment, Some(0.6));
}

// ============================================================================
// Windowing
// ============================================================================

#[tokio::test]
async fn test_posts_without_ticks_produce_no_row() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(5, 1, 100.0)]).await;
    add_post(&repos, "p1", "eth eth eth", 0.9, at(5, 10)).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(6, 5));

    let report = engine.run_once().await.unwrap();

    assert_eq!(report.inserted, 1);
    assert!(rows(&repos, "ETH-USD").await.is_empty());
}

#[tokio::test]
async fn test_empty_minutes_in_window_are_skipped() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(0, 1, 100.0), (3, 1, 101.0), (5, 1, 102.0)]).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(6, 5));

    let report = engine.run_once().await.unwrap();

    assert_eq!(report.minutes_considered, 6);
    assert_eq!(report.minutes_with_ticks, 3);
    assert_eq!(report.inserted, 3);

    let minutes: Vec<_> = rows(&repos, "BTC-USD").await.iter().map(|r| r.minute).collect();
    assert_eq!(minutes, vec![at(5, 0), at(3, 0), at(0, 0)]);
}

#[tokio::test]
async fn test_window_ends_at_latest_tick_minute() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(0, 1, 100.0), (9, 1, 101.0)]).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(3, 5));

    let report = engine.run_once().await.unwrap();

    // minute 0 is outside 7..=9
    assert_eq!(report.inserted, 1);
    assert_eq!(rows(&repos, "BTC-USD").await[0].minute, at(9, 0));
}

#[tokio::test]
async fn test_no_ticks_is_a_no_op() {
    let repos = store().await;
    add_post(&repos, "p1", "btc", 0.5, at(0, 0)).await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(6, 5));

    let report = engine.run_once().await.unwrap();

    assert_eq!(report, CycleReport::default());
    assert_eq!(repos.aggregates.count().await.unwrap(), 0);
}

// ============================================================================
// Failure isolation
// ============================================================================

/// Delegates to SQLite but refuses aggregate writes for one symbol.
struct FlakyStore {
    inner: Repositories,
    broken_symbol: String,
}

#[async_trait]
impl MarketStore for FlakyStore {
    async fn insert_tick(&self, tick: &Tick) -> Result<()> {
        self.inner.insert_tick(tick).await
    }

    async fn insert_post(&self, post: &Post) -> Result<InsertOutcome> {
        self.inner.insert_post(post).await
    }

    async fn query_ticks(
        &self,
        symbol: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Tick>> {
        self.inner.query_ticks(symbol, from, to).await
    }

    async fn latest_tick_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.latest_tick_timestamp().await
    }

    async fn query_posts(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Post>> {
        self.inner.query_posts(from, to).await
    }

    async fn latest_post_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.latest_post_timestamp().await
    }

    async fn insert_aggregate_if_absent(&self, row: &Aggregate) -> Result<InsertOutcome> {
        if row.symbol == self.broken_symbol {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.insert_aggregate_if_absent(row).await
    }
}

#[tokio::test]
async fn test_failed_row_does_not_abort_cycle() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(1, 1, 100.0), (2, 1, 101.0)]).await;
    add_ticks(&repos, "ETH-USD", &[(1, 2, 3000.0), (2, 2, 3001.0)]).await;
    let flaky = FlakyStore {
        inner: repos.clone(),
        broken_symbol: "BTC-USD".to_string(),
    };
    let engine = AggregationEngine::new(Arc::new(flaky), config(6, 5));

    let report = engine.run_once().await.unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(rows(&repos, "ETH-USD").await.len(), 2);
    assert!(rows(&repos, "BTC-USD").await.is_empty());
}

// ============================================================================
// Polling loop
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_loop_aggregates_and_stops() {
    let repos = store().await;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), config(6, 5))
        .with_poll_interval(Duration::from_millis(20));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { engine.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    add_ticks(&repos, "BTC-USD", &[(0, 1, 100.0)]).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(repos.aggregates.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zero_poll_interval_does_not_panic() {
    let repos = store().await;
    add_ticks(&repos, "BTC-USD", &[(0, 1, 100.0)]).await;
    let mut cfg = config(6, 5);
    cfg.poll_interval_secs = 0;
    let engine = AggregationEngine::new(Arc::new(repos.clone()), cfg);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { engine.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(repos.aggregates.count().await.unwrap(), 1);
}
