//! Core types, traits and configuration for the market pulse pipeline.

pub mod config;
pub mod config_loader;
pub mod records;
pub mod traits;

pub use config::{
    AggregatorConfig, AppConfig, DatabaseConfig, FeedConfig, PostsConfig, MIN_INTERVAL,
};
pub use config_loader::{ConfigLoader, DEFAULT_CONFIG_PATH};
pub use records::{
    floor_to_minute, trailing_minutes, truncate_to_second, Aggregate, InsertOutcome, Post, Tick,
};
pub use traits::{MarketStore, SentimentScorer};
