use clap::{Parser, Subcommand};
use market_pulse_core::DEFAULT_CONFIG_PATH;

mod commands;

use commands::{AppContext, StatusArgs};

#[derive(Parser)]
#[command(name = "market-pulse")]
#[command(about = "Per-minute OHLC and sentiment aggregation over a live tick feed", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Database URL (overrides `database.url`)
    #[arg(long, global = true, env = "DATABASE_URL")]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ingestion, post collection and aggregation until Ctrl+C
    Run,
    /// Stream ticks from the exchange feed into the database
    Ingest,
    /// Fetch, score and store social posts
    CollectPosts {
        /// Run a single collection cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Build per-minute aggregates from stored ticks and posts
    Aggregate {
        /// Run a single aggregation cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Show row counts and recent aggregates
    Status(StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let ctx = AppContext::load(&cli.config, cli.db_url).await?;

    match cli.command {
        Commands::Run => {
            commands::run_pipeline(&ctx, commands::shutdown_on_ctrl_c()).await?;
        }
        Commands::Ingest => {
            commands::run_ingest(&ctx, commands::shutdown_on_ctrl_c()).await?;
        }
        Commands::CollectPosts { once } => {
            commands::run_collect_posts(&ctx, once, commands::shutdown_on_ctrl_c()).await?;
        }
        Commands::Aggregate { once } => {
            commands::run_aggregate(&ctx, once, commands::shutdown_on_ctrl_c()).await?;
        }
        Commands::Status(args) => {
            commands::run_status(&ctx, args).await?;
        }
    }

    Ok(())
}
