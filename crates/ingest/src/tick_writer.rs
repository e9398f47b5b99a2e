//! Tick persistence.
//!
//! [`TickWriter`] validates and stores a single tick. [`TickWriterPool`]
//! runs a fixed number of writers over a bounded queue so the feed receive
//! loop never waits on more than the queue depth, and so shutdown can await
//! every queued tick.

use market_pulse_core::{MarketStore, Tick};
use serde::Serialize;
use std::ops::AddAssign;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a tick was refused before reaching the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickRejection {
    #[error("empty symbol")]
    EmptySymbol,
    #[error("invalid price {0}")]
    InvalidPrice(f64),
}

/// Result of persisting one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Rejected,
    Failed,
}

/// Validates a tick. Unusable volume is coerced to 0.
///
/// # Errors
/// Returns a [`TickRejection`] for an empty symbol or a non-positive or
/// non-finite price.
pub fn validate_tick(mut tick: Tick) -> Result<Tick, TickRejection> {
    tick.symbol = tick.symbol.trim().to_string();
    if tick.symbol.is_empty() {
        return Err(TickRejection::EmptySymbol);
    }
    if !tick.price.is_finite() || tick.price <= 0.0 {
        return Err(TickRejection::InvalidPrice(tick.price));
    }
    if !tick.volume.is_finite() || tick.volume < 0.0 {
        tick.volume = 0.0;
    }
    Ok(tick)
}

/// Writes ticks to the store. Never propagates failures.
#[derive(Clone)]
pub struct TickWriter {
    store: Arc<dyn MarketStore>,
}

impl TickWriter {
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub async fn persist(&self, tick: Tick) -> WriteOutcome {
        let tick = match validate_tick(tick) {
            Ok(tick) => tick,
            Err(reason) => {
                warn!(reason = %reason, "Rejected tick");
                return WriteOutcome::Rejected;
            }
        };

        match self.store.insert_tick(&tick).await {
            Ok(()) => {
                debug!(symbol = %tick.symbol, price = tick.price, ts = %tick.timestamp, "Tick stored");
                WriteOutcome::Written
            }
            Err(e) => {
                error!(symbol = %tick.symbol, error = %e, "Failed to store tick");
                WriteOutcome::Failed
            }
        }
    }
}

/// Per-outcome tick counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    pub written: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl WriterStats {
    fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.written += 1,
            WriteOutcome::Rejected => self.rejected += 1,
            WriteOutcome::Failed => self.failed += 1,
        }
    }
}

impl AddAssign for WriterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.written += rhs.written;
        self.rejected += rhs.rejected;
        self.failed += rhs.failed;
    }
}

/// Fixed set of writer tasks sharing one bounded queue.
pub struct TickWriterPool {
    workers: Vec<JoinHandle<WriterStats>>,
}

impl TickWriterPool {
    /// Spawns `workers` writers (at least one) behind a queue of `capacity`.
    ///
    /// Returns the queue's sender. The pool finishes once every clone of the
    /// sender is dropped and the queue is empty.
    #[must_use]
    pub fn spawn(writer: TickWriter, workers: usize, capacity: usize) -> (mpsc::Sender<Tick>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|id| {
                let writer = writer.clone();
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    let mut stats = WriterStats::default();
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(tick) = next else { break };
                        stats.record(writer.persist(tick).await);
                    }
                    debug!(worker = id, written = stats.written, "Tick writer finished");
                    stats
                })
            })
            .collect();

        (tx, Self { workers })
    }

    /// Waits for every queued tick to be handled.
    ///
    /// Only completes after all senders are dropped.
    pub async fn drain(self) -> WriterStats {
        let mut total = WriterStats::default();
        for handle in self.workers {
            match handle.await {
                Ok(stats) => total += stats,
                Err(e) => error!(error = %e, "Tick writer task panicked"),
            }
        }
        info!(
            written = total.written,
            rejected = total.rejected,
            failed = total.failed,
            "Tick writers drained"
        );
        total
    }
}
