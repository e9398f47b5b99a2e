//! Storage for the market pulse pipeline.
//!
//! This crate provides:
//! - `DatabaseClient`, a migrated SQLite pool
//! - Repositories for ticks, posts and minute aggregates
//! - A `MarketStore` implementation over those repositories

pub mod database;
pub mod repositories;

pub use database::DatabaseClient;
pub use repositories::{
    AggregateRepository, PostRepository, Repositories, StoreCounts, TickRepository,
};
