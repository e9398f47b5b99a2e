//! `collect-posts`: poll the post source, score and store.

use anyhow::Result;
use market_pulse_ingest::{LexiconScorer, PostCollector, RedditSource};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::context::AppContext;

/// Runs one cycle when `once` is set, otherwise polls until shutdown.
///
/// # Errors
/// Returns an error if the HTTP client or scorer cannot be built, or, with
/// `once`, if the single cycle fails.
pub async fn run_collect_posts(
    ctx: &AppContext,
    once: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let posts = &ctx.config.posts;
    let collector = PostCollector::new(
        Arc::new(RedditSource::from_config(posts)?),
        Arc::new(LexiconScorer::new()?),
        ctx.store(),
    )
    .with_poll_interval(posts.poll_interval());

    if once {
        let report = collector.poll_once().await?;
        info!(
            fetched = report.fetched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            "Post collection finished"
        );
        return Ok(());
    }

    info!(subreddits = ?posts.subreddits, "Starting post collection");
    collector.run(shutdown).await;
    Ok(())
}
