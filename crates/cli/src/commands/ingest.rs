//! `ingest`: feed connection manager feeding the tick writer pool.

use anyhow::{Context as _, Result};
use market_pulse_ingest::{ConnectionManager, ConnectionSettings, TickWriter, TickWriterPool};
use tokio::sync::watch;
use tracing::info;

use super::context::AppContext;

/// Streams ticks until shutdown, then drains queued writes.
///
/// # Errors
/// Returns an error if the feed URL is invalid. Nothing is spawned then.
pub async fn run_ingest(ctx: &AppContext, shutdown: watch::Receiver<bool>) -> Result<()> {
    let feed = &ctx.config.feed;
    let settings = ConnectionSettings::from_config(feed);
    settings
        .feed_url()
        .with_context(|| format!("Invalid feed.url: {}", feed.url))?;

    let (tick_tx, pool) = TickWriterPool::spawn(
        TickWriter::new(ctx.store()),
        feed.writer_workers,
        feed.writer_queue,
    );

    info!(
        url = %feed.url,
        channel = %feed.channel,
        symbols = ?feed.symbols,
        workers = feed.writer_workers,
        "Starting tick ingestion"
    );

    let manager = ConnectionManager::new(settings, tick_tx)?;
    let feed_stats = manager.run(shutdown).await;
    let writer_stats = pool.drain().await;

    info!(
        connects = feed_stats.connects,
        failures = feed_stats.failures,
        messages = feed_stats.messages,
        ticks = feed_stats.ticks,
        written = writer_stats.written,
        rejected = writer_stats.rejected,
        failed = writer_stats.failed,
        "Tick ingestion stopped"
    );
    Ok(())
}
