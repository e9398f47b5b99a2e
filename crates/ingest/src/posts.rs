//! Social post collection.
//!
//! Each cycle asks the store for the newest known post, fetches anything
//! newer from the [`PostSource`], scores it and stores it. Duplicate IDs are
//! skipped by the store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_pulse_core::{
    InsertOutcome, MarketStore, Post, PostsConfig, SentimentScorer, MIN_INTERVAL,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::connection::wait_for_shutdown;

const TITLE_CHARS: usize = 200;
const BODY_CHARS: usize = 300;

/// A post as fetched, before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost {
    pub id: String,
    pub source: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// External content source.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Posts created strictly after `since` (everything when `None`).
    async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawPost>>;
}

#[derive(Error, Debug)]
pub enum PostSourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

// ============================================================================
// Reddit listing
// ============================================================================

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    id: String,
    #[serde(default)]
    subreddit: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    created_utc: f64,
}

impl RedditPost {
    #[allow(clippy::cast_possible_truncation)]
    fn into_raw(self, requested: &str) -> Option<RawPost> {
        let created_at = DateTime::from_timestamp(self.created_utc as i64, 0)?;

        let title: String = self.title.unwrap_or_default().chars().take(TITLE_CHARS).collect();
        let body: String = self.selftext.unwrap_or_default().chars().take(BODY_CHARS).collect();
        let text = format!("{title} {body}").trim().to_string();

        Some(RawPost {
            id: format!("t3_{}", self.id),
            source: self.subreddit.unwrap_or_else(|| requested.to_string()),
            text,
            created_at,
        })
    }
}

/// Public `new.json` listings for a set of subreddits.
pub struct RedditSource {
    http: Client,
    base_url: String,
    subreddits: Vec<String>,
    limit: u32,
}

impl RedditSource {
    /// Builds a source with the configured user agent and request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &PostsConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            subreddits: config.subreddits.clone(),
            limit: config.limit,
        })
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetches the newest posts of one subreddit.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status or an
    /// undecodable body.
    pub async fn fetch_subreddit(&self, subreddit: &str) -> Result<Vec<RawPost>, PostSourceError> {
        let url = format!("{}/r/{}/new.json", self.base_url, subreddit);
        debug!(url = %url, limit = self.limit, "Fetching subreddit listing");

        let response = self
            .http
            .get(&url)
            .query(&[("limit", self.limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(300)
                .collect();
            return Err(PostSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let listing: Listing = response.json().await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .filter_map(|child| child.data.into_raw(subreddit))
            .collect())
    }
}

#[async_trait]
impl PostSource for RedditSource {
    async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawPost>> {
        let mut posts = Vec::new();

        for subreddit in &self.subreddits {
            match self.fetch_subreddit(subreddit).await {
                Ok(fetched) => {
                    let total = fetched.len();
                    posts.extend(
                        fetched
                            .into_iter()
                            .filter(|p| since.map_or(true, |s| p.created_at > s)),
                    );
                    debug!(subreddit = %subreddit, total, "Fetched listing");
                }
                Err(e) => warn!(subreddit = %subreddit, error = %e, "Subreddit fetch failed"),
            }
        }

        Ok(posts)
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Outcome of one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Totals across cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectorStats {
    pub cycles: u64,
    pub errors: u64,
    pub inserted: u64,
    pub last_poll: Option<DateTime<Utc>>,
}

impl CollectorStats {
    fn record(&mut self, report: &PollReport) {
        self.cycles += 1;
        self.inserted += report.inserted as u64;
        self.last_poll = Some(Utc::now());
    }
}

pub struct PostCollector {
    source: Arc<dyn PostSource>,
    scorer: Arc<dyn SentimentScorer>,
    store: Arc<dyn MarketStore>,
    poll_interval: Duration,
}

impl PostCollector {
    #[must_use]
    pub fn new(
        source: Arc<dyn PostSource>,
        scorer: Arc<dyn SentimentScorer>,
        store: Arc<dyn MarketStore>,
    ) -> Self {
        Self {
            source,
            scorer,
            store,
            poll_interval: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_INTERVAL);
        self
    }

    /// Runs one fetch, score and store cycle.
    ///
    /// # Errors
    /// Returns an error if the latest post timestamp cannot be read or the
    /// source fails outright. Individual insert failures are counted in the
    /// report instead.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let since = self.store.latest_post_timestamp().await?;
        let fetched = self.source.fetch_since(since).await?;

        let mut report = PollReport {
            fetched: fetched.len(),
            ..PollReport::default()
        };

        for raw in fetched {
            let sentiment = self.scorer.score(&raw.text);
            let post = Post::new(raw.id, raw.source, raw.text, sentiment, raw.created_at);

            match self.store.insert_post(&post).await {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted += 1;
                    debug!(id = %post.id, sentiment = post.sentiment, "Post stored");
                }
                Ok(InsertOutcome::Skipped) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(id = %post.id, error = %e, "Failed to store post");
                }
            }
        }

        info!(
            since = ?since,
            fetched = report.fetched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            "Post collection cycle complete"
        );
        Ok(report)
    }

    /// Polls every interval until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> CollectorStats {
        let mut stats = CollectorStats::default();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.poll_interval, "Post collector started");

        loop {
            tokio::select! {
                () = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(report) => stats.record(&report),
                        Err(e) => {
                            stats.errors += 1;
                            warn!(error = %e, "Post collection failed, retrying next cycle");
                        }
                    }
                }
            }
        }

        info!(cycles = stats.cycles, inserted = stats.inserted, "Post collector stopped");
        stats
    }
}
