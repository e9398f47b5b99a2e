//! Per-minute aggregation of stored ticks and posts.
//!
//! The building blocks ([`compute_ohlc`], [`attribute_sentiment`],
//! [`build_minute_aggregates`]) are pure; [`AggregationEngine`] wires them to
//! a [`MarketStore`](market_pulse_core::MarketStore).

pub mod attribution;
pub mod engine;
pub mod ohlc;

pub use attribution::{attribute_sentiment, matches_keywords, SentimentSummary};
pub use engine::{build_minute_aggregates, AggregationEngine, CycleReport};
pub use ohlc::{compute_ohlc, price_change_pct, Ohlc};
