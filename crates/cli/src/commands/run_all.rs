//! `run`: ingestion, post collection and aggregation as separate tasks.

use anyhow::{Context as _, Result};
use tokio::sync::watch;
use tracing::info;

use super::aggregate::run_aggregate;
use super::collect_posts::run_collect_posts;
use super::context::AppContext;
use super::ingest::run_ingest;

/// Spawns every long-lived activity and waits for all of them to stop.
///
/// # Errors
/// Returns the first setup error of any activity, or a task panic, after
/// all tasks have finished.
pub async fn run_pipeline(ctx: &AppContext, shutdown: watch::Receiver<bool>) -> Result<()> {
    info!("Starting market pulse pipeline");

    let ingest = tokio::spawn({
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        async move { run_ingest(&ctx, shutdown).await }
    });
    let posts = tokio::spawn({
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        async move { run_collect_posts(&ctx, false, shutdown).await }
    });
    let aggregate = tokio::spawn({
        let ctx = ctx.clone();
        async move { run_aggregate(&ctx, false, shutdown).await }
    });

    let (ingest, posts, aggregate) = tokio::join!(ingest, posts, aggregate);

    info!("Market pulse pipeline stopped");
    ingest.context("Ingest task panicked")??;
    posts.context("Post collector task panicked")??;
    aggregate.context("Aggregator task panicked")?
}
