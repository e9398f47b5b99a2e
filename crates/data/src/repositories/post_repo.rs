//! Post repository.
//!
//! Posts are keyed by their source ID; re-inserting an ID is a no-op.

use anyhow::Result;
use chrono::{DateTime, Utc};
use market_pulse_core::{InsertOutcome, Post};
use sqlx::{FromRow, SqlitePool};

use crate::database::from_epoch;

#[derive(Debug, FromRow)]
struct PostRow {
    id: String,
    source: String,
    text: String,
    sentiment: f64,
    created_utc: i64,
}

impl TryFrom<PostRow> for Post {
    type Error = anyhow::Error;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: row.id,
            source: row.source,
            text: row.text,
            sentiment: row.sentiment,
            created_at: from_epoch(row.created_utc)?,
        })
    }
}

/// Repository for post operations.
#[derive(Debug, Clone)]
pub struct PostRepository {
    pool: SqlitePool,
}

impl PostRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a post unless its ID is already stored.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, post: &Post) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, source, text, sentiment, created_utc)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&post.id)
        .bind(&post.source)
        .bind(&post.text)
        .bind(post.sentiment)
        .bind(post.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::Skipped
        } else {
            InsertOutcome::Inserted
        })
    }

    /// Queries posts created in `[start, end)`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, source, text, sentiment, created_utc
            FROM posts
            WHERE created_utc >= ?1 AND created_utc < ?2
            ORDER BY created_utc ASC, id ASC
            "#,
        )
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    /// Returns the creation time of the newest post, if any.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(created_utc) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        latest.map(from_epoch).transpose()
    }

    /// Counts stored posts.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseClient;
    use chrono::TimeZone;

    fn at(min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 29, 12, min, sec).unwrap()
    }

    async fn repo() -> PostRepository {
        let db = DatabaseClient::connect_in_memory().await.unwrap();
        PostRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_duplicate_id_is_skipped() {
        let repo = repo().await;
        let post = Post::new("t3_abc", "Bitcoin", "btc to the moon", 0.6, at(0, 10));

        assert_eq!(repo.insert(&post).await.unwrap(), InsertOutcome::Inserted);

        let changed = Post::new("t3_abc", "Bitcoin", "edited", -0.9, at(5, 0));
        assert_eq!(repo.insert(&changed).await.unwrap(), InsertOutcome::Skipped);

        let stored = repo.query_by_time_range(at(0, 0), at(10, 0)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "btc to the moon");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_range_and_latest() {
        let repo = repo().await;
        assert!(repo.latest_timestamp().await.unwrap().is_none());

        repo.insert(&Post::new("a", "s", "one", 0.1, at(1, 0))).await.unwrap();
        repo.insert(&Post::new("b", "s", "two", 0.2, at(1, 59))).await.unwrap();
        repo.insert(&Post::new("c", "s", "three", 0.3, at(2, 0))).await.unwrap();

        let in_minute = repo.query_by_time_range(at(1, 0), at(2, 0)).await.unwrap();
        let ids: Vec<&str> = in_minute.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(repo.latest_timestamp().await.unwrap(), Some(at(2, 0)));
    }
}
