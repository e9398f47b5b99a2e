use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Shortest period any timer in the pipeline is allowed to run at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub posts: PostsConfig,
    pub aggregator: AggregatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Tick feed subscription and connection lifecycle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// Feed channel; only messages of this type are accepted
    pub channel: String,
    pub symbols: Vec<String>,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Tick writer worker tasks
    pub writer_workers: usize,
    /// Bounded queue between the receive loop and the writers
    pub writer_queue: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostsConfig {
    pub base_url: String,
    pub subreddits: Vec<String>,
    pub limit: u32,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub poll_interval_secs: u64,
    /// Number of trailing minutes recomputed every cycle (K)
    pub trailing_minutes: u32,
    /// Sentiment lookback used when a minute has no posts (F)
    pub fallback_minutes: u32,
    /// Per-symbol keyword lists for post attribution
    pub keywords: HashMap<String, Vec<String>>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://crypto.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://ws-feed.exchange.coinbase.com".to_string(),
            channel: "ticker".to_string(),
            symbols: vec![
                "BTC-USD".to_string(),
                "ETH-USD".to_string(),
                "USDT-USD".to_string(),
            ],
            base_backoff_secs: 1,
            max_backoff_secs: 60,
            ping_interval_secs: 20,
            ping_timeout_secs: 10,
            connect_timeout_secs: 15,
            writer_workers: 4,
            writer_queue: 1024,
        }
    }
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            subreddits: vec![
                "CryptoCurrency".to_string(),
                "Bitcoin".to_string(),
                "ethereum".to_string(),
            ],
            limit: 50,
            poll_interval_secs: 60,
            request_timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let keywords = [
            ("BTC-USD", &["btc", "bitcoin", "sats", "btcusd"][..]),
            ("ETH-USD", &["eth", "ethereum", "ether", "ethusd"][..]),
            ("USDT-USD", &["usdt", "tether"][..]),
        ]
        .into_iter()
        .map(|(symbol, words)| {
            (
                symbol.to_string(),
                words.iter().map(|w| (*w).to_string()).collect(),
            )
        })
        .collect();

        Self {
            poll_interval_secs: 30,
            trailing_minutes: 6,
            fallback_minutes: 5,
            keywords,
        }
    }
}

impl AppConfig {
    /// Rejects settings that would stall or spin the long-running loops.
    ///
    /// # Errors
    /// Returns an error naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("feed.base_backoff_secs", self.feed.base_backoff_secs),
            ("feed.max_backoff_secs", self.feed.max_backoff_secs),
            ("feed.ping_interval_secs", self.feed.ping_interval_secs),
            ("feed.connect_timeout_secs", self.feed.connect_timeout_secs),
            ("posts.poll_interval_secs", self.posts.poll_interval_secs),
            ("posts.request_timeout_secs", self.posts.request_timeout_secs),
            ("aggregator.poll_interval_secs", self.aggregator.poll_interval_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                bail!("{key} must be greater than 0");
            }
        }

        if self.feed.max_backoff_secs < self.feed.base_backoff_secs {
            bail!(
                "feed.max_backoff_secs ({}) is below feed.base_backoff_secs ({})",
                self.feed.max_backoff_secs,
                self.feed.base_backoff_secs
            );
        }
        if self.feed.symbols.is_empty() {
            bail!("feed.symbols must not be empty");
        }
        if self.aggregator.trailing_minutes == 0 {
            bail!("aggregator.trailing_minutes must be greater than 0");
        }
        Ok(())
    }
}

impl FeedConfig {
    #[must_use]
    pub const fn base_backoff(&self) -> Duration {
        Duration::from_secs(self.base_backoff_secs)
    }

    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    #[must_use]
    pub const fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PostsConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AggregatorConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Keyword list for a symbol, if one is configured and non-empty.
    #[must_use]
    pub fn keywords_for(&self, symbol: &str) -> Option<&[String]> {
        self.keywords
            .get(symbol)
            .map(Vec::as_slice)
            .filter(|words| !words.is_empty())
    }
}
