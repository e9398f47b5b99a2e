//! Ingestion side of the market pulse pipeline.
//!
//! - [`connection`]: feed websocket lifecycle (subscribe, stream, back off)
//! - [`decode`]: ticker message decoding
//! - [`tick_writer`]: validated tick persistence behind a bounded worker pool
//! - [`posts`]: social post fetching, scoring and storage
//! - [`sentiment`]: lexicon sentiment scorer

pub mod backoff;
pub mod connection;
pub mod decode;
pub mod posts;
pub mod sentiment;
pub mod tick_writer;

pub use backoff::Backoff;
pub use connection::{ConnectionManager, ConnectionSettings, ConnectionState, FeedError, FeedStats};
pub use decode::{decode_message, Decoded};
pub use posts::{
    CollectorStats, PollReport, PostCollector, PostSource, PostSourceError, RawPost, RedditSource,
};
pub use sentiment::LexiconScorer;
pub use tick_writer::{validate_tick, TickRejection, TickWriter, TickWriterPool, WriterStats};
