//! `aggregate`: the per-minute aggregation loop.

use anyhow::Result;
use market_pulse_aggregator::AggregationEngine;
use tokio::sync::watch;
use tracing::info;

use super::context::AppContext;

/// Runs one cycle when `once` is set, otherwise loops until shutdown.
///
/// # Errors
/// With `once`, returns an error if the cycle cannot read the store.
pub async fn run_aggregate(
    ctx: &AppContext,
    once: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let engine = AggregationEngine::new(ctx.store(), ctx.config.aggregator.clone());

    if once {
        let report = engine.run_once().await?;
        info!(
            minutes = report.minutes_considered,
            with_ticks = report.minutes_with_ticks,
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            "Aggregation cycle finished"
        );
        return Ok(());
    }

    engine.run(shutdown).await;
    Ok(())
}
