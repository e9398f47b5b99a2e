//! `status`: row counts and the most recent aggregates.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use market_pulse_core::{Aggregate, MarketStore};
use market_pulse_data::StoreCounts;
use serde::Serialize;

use super::context::AppContext;

/// Arguments for the status command.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Only show aggregates for this symbol (e.g., "BTC-USD")
    #[arg(long)]
    pub symbol: Option<String>,

    /// Number of aggregate rows to show
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    counts: StoreCounts,
    latest_tick: Option<DateTime<Utc>>,
    latest_post: Option<DateTime<Utc>>,
    aggregates: Vec<Aggregate>,
}

/// Prints the status report.
///
/// # Errors
/// Returns an error if any query fails.
pub async fn run_status(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let repos = ctx.repositories();
    let report = StatusReport {
        counts: repos.counts().await?,
        latest_tick: repos.latest_tick_timestamp().await?,
        latest_post: repos.latest_post_timestamp().await?,
        aggregates: repos
            .aggregates
            .query_recent(args.symbol.as_deref(), args.limit)
            .await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.symbol.as_deref());
    }
    Ok(())
}

fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "N/A".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn format_sentiment(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:+.3}"))
}

fn aggregate_line(row: &Aggregate) -> String {
    format!(
        "{:<17} {:<10} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.4} {:>8.3}% {:>9} {:>6}",
        row.minute.format("%Y-%m-%d %H:%M").to_string(),
        row.symbol,
        row.open_price,
        row.high_price,
        row.low_price,
        row.close_price,
        row.volume,
        row.price_change_pct,
        format_sentiment(row.avg_sentiment),
        row.post_count,
    )
}

fn print_report(report: &StatusReport, symbol: Option<&str>) {
    println!();
    println!("{}", "=".repeat(120));
    println!("MARKET PULSE STATUS");
    if let Some(sym) = symbol {
        println!("Filter: symbol = {sym}");
    }
    println!("{}", "=".repeat(120));
    println!();
    println!(
        "Ticks: {:>10}   latest {}",
        report.counts.ticks,
        format_time(report.latest_tick)
    );
    println!(
        "Posts: {:>10}   latest {}",
        report.counts.posts,
        format_time(report.latest_post)
    );
    println!("Aggregates: {:>5}", report.counts.aggregates);
    println!();

    if report.aggregates.is_empty() {
        println!("No aggregates yet. Run `market-pulse aggregate --once` after ingesting ticks.");
        return;
    }

    println!(
        "{:<17} {:<10} {:>12} {:>12} {:>12} {:>12} {:>12} {:>9} {:>9} {:>6}",
        "Minute", "Symbol", "Open", "High", "Low", "Close", "Volume", "Change", "Sentiment", "Posts"
    );
    println!("{}", "-".repeat(120));
    for row in &report.aggregates {
        println!("{}", aggregate_line(row));
    }
}
