//! Aggregation engine.
//!
//! Every cycle recomputes the trailing `K` minutes ending at the newest
//! stored tick. Rows are written insert-if-absent, so overlapping cycles
//! never duplicate or rewrite a `(minute, symbol)` row.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use market_pulse_core::{
    trailing_minutes, Aggregate, AggregatorConfig, InsertOutcome, MarketStore, Post, Tick,
    MIN_INTERVAL,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::attribution::attribute_sentiment;
use crate::ohlc::compute_ohlc;

/// Builds one aggregate row per symbol present in `ticks`.
///
/// `posts` is the effective post set for the minute; `keywords` looks up a
/// symbol's keyword list.
#[must_use]
pub fn build_minute_aggregates<'k>(
    minute: DateTime<Utc>,
    ticks: &[Tick],
    posts: &[Post],
    keywords: impl Fn(&str) -> Option<&'k [String]>,
) -> Vec<Aggregate> {
    compute_ohlc(ticks)
        .into_iter()
        .map(|(symbol, ohlc)| {
            let sentiment = attribute_sentiment(posts, keywords(&symbol));
            Aggregate {
                minute,
                avg_sentiment: sentiment.avg_sentiment,
                post_count: sentiment.post_count,
                open_price: ohlc.open,
                close_price: ohlc.close,
                high_price: ohlc.high,
                low_price: ohlc.low,
                volume: ohlc.volume,
                price_change_pct: ohlc.price_change_pct(),
                symbol,
            }
        })
        .collect()
}

/// Counts for one engine cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub minutes_considered: usize,
    pub minutes_with_ticks: usize,
    pub inserted: usize,
    /// Rows that already existed
    pub skipped: usize,
    /// Rows or minutes lost to storage errors
    pub failed: usize,
}

pub struct AggregationEngine {
    store: Arc<dyn MarketStore>,
    config: AggregatorConfig,
    poll_interval: Duration,
}

impl AggregationEngine {
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, config: AggregatorConfig) -> Self {
        let poll_interval = config.poll_interval().max(MIN_INTERVAL);
        Self {
            store,
            config,
            poll_interval,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_INTERVAL);
        self
    }

    /// Runs a single cycle over the trailing window.
    ///
    /// # Errors
    /// Returns an error only if the newest tick timestamp cannot be read.
    /// Failures inside a minute are logged and counted in the report.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let Some(latest) = self.store.latest_tick_timestamp().await? else {
            debug!("No ticks stored yet, nothing to aggregate");
            return Ok(CycleReport::default());
        };

        let minutes = trailing_minutes(latest, self.config.trailing_minutes);
        let mut report = CycleReport {
            minutes_considered: minutes.len(),
            ..CycleReport::default()
        };

        for minute in minutes {
            if let Err(e) = self.aggregate_minute(minute, &mut report).await {
                report.failed += 1;
                error!(minute = %minute, error = %e, "Failed to aggregate minute");
            }
        }

        Ok(report)
    }

    async fn aggregate_minute(&self, minute: DateTime<Utc>, report: &mut CycleReport) -> Result<()> {
        let end = minute + ChronoDuration::minutes(1);

        let ticks = self.store.query_ticks(None, minute, end).await?;
        if ticks.is_empty() {
            return Ok(());
        }
        report.minutes_with_ticks += 1;

        let posts = self.effective_posts(minute, end).await?;
        let rows = build_minute_aggregates(minute, &ticks, &posts, |symbol| {
            self.config.keywords_for(symbol)
        });

        for row in rows {
            match self.store.insert_aggregate_if_absent(&row).await {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted += 1;
                    debug!(
                        minute = %row.minute,
                        symbol = %row.symbol,
                        close = row.close_price,
                        posts = row.post_count,
                        "Aggregate inserted"
                    );
                }
                Ok(InsertOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(minute = %row.minute, symbol = %row.symbol, error = %e, "Failed to insert aggregate");
                }
            }
        }

        Ok(())
    }

    /// Exact-minute posts, or the fallback window when the minute has none.
    async fn effective_posts(&self, minute: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Post>> {
        let exact = self.store.query_posts(minute, end).await?;
        if !exact.is_empty() || self.config.fallback_minutes == 0 {
            return Ok(exact);
        }

        let start = minute - ChronoDuration::minutes(i64::from(self.config.fallback_minutes));
        let fallback = self.store.query_posts(start, end).await?;
        if !fallback.is_empty() {
            debug!(minute = %minute, posts = fallback.len(), "Using fallback sentiment window");
        }
        Ok(fallback)
    }

    /// Runs cycles every poll interval until `shutdown` flips to `true`.
    ///
    /// Cycles never overlap; a slow cycle delays the next one.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval = ?self.poll_interval,
            trailing_minutes = self.config.trailing_minutes,
            fallback_minutes = self.config.fallback_minutes,
            "Aggregator started"
        );

        loop {
            tokio::select! {
                () = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.inserted > 0 => {
                            info!(
                                inserted = report.inserted,
                                skipped = report.skipped,
                                failed = report.failed,
                                "Inserted {} aggregate rows",
                                report.inserted
                            );
                        }
                        Ok(report) => {
                            info!(skipped = report.skipped, failed = report.failed, "No new aggregates this cycle");
                        }
                        Err(e) => warn!(error = %e, "Aggregation cycle failed"),
                    }
                }
            }
        }

        info!("Aggregator stopped");
    }
}
