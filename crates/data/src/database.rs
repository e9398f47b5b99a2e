use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::repositories::Repositories;

/// SQLite connection pool with the market schema applied.
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    pool: SqlitePool,
}

impl DatabaseClient {
    /// Connects to the database at `database_url` (e.g. `sqlite://crypto.db`),
    /// creating the file if needed, and runs migrations.
    ///
    /// In-memory URLs get the single-connection pool of
    /// [`connect_in_memory`](Self::connect_in_memory).
    ///
    /// # Errors
    /// Returns an error if the URL is invalid, the connection cannot be
    /// established, or migrations fail.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        if database_url.contains(":memory:") {
            return Self::connect_in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {database_url}"))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Creates a private in-memory database.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// every SQLite in-memory connection is a separate database.
    ///
    /// # Errors
    /// Returns an error if connection or migrations fail.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::debug!("Database migrations applied");
        Ok(())
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the repository bundle over this pool.
    #[must_use]
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }
}

/// Converts stored epoch seconds back to a UTC timestamp.
pub(crate) fn from_epoch(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow!("Timestamp out of range: {secs}"))
}
