//! Shared setup for every command: configuration, database, shutdown.

use anyhow::{Context as _, Result};
use market_pulse_core::{AppConfig, ConfigLoader, MarketStore};
use market_pulse_data::{DatabaseClient, Repositories};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Loaded configuration plus an open, migrated database.
#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub db: DatabaseClient,
}

impl AppContext {
    /// Loads configuration from `config_path` and connects to the database.
    ///
    /// `db_url` overrides `database.url` when given.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be parsed or the database
    /// cannot be opened.
    pub async fn load(config_path: &str, db_url: Option<String>) -> Result<Self> {
        let mut config = ConfigLoader::load_from(config_path)
            .with_context(|| format!("Failed to load config from {config_path}"))?;
        if let Some(url) = db_url {
            config.database.url = url;
        }

        ensure_sqlite_parent(&config.database.url)?;
        tracing::info!(url = %config.database.url, "Opening database");
        let db = DatabaseClient::connect(&config.database.url, config.database.max_connections).await?;

        Ok(Self { config, db })
    }

    #[must_use]
    pub fn repositories(&self) -> Repositories {
        self.db.repositories()
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn MarketStore> {
        Arc::new(self.db.repositories())
    }
}

/// Creates the parent directory of a file-backed SQLite URL.
fn ensure_sqlite_parent(url: &str) -> Result<()> {
    let Some(file_path) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let file_path = file_path.split('?').next().unwrap_or(file_path);
    if file_path.is_empty() || file_path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Returns a receiver that flips to `true` on Ctrl+C.
#[must_use]
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        let _ = tx.send(true);
        // keep the sender alive so receivers see `true`, not a closed channel
        std::future::pending::<()>().await;
    });
    rx
}
