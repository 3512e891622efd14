use anyhow::Result;
use sqlx::{self, Row};
use tracing::debug;

use super::core::Database;
use crate::clustering::Source;
use crate::TARGET_DB;

impl Database {
    /// Registers a feed source and returns its id
    pub async fn add_source(
        &self,
        name: &str,
        feed_url: Option<&str>,
        weight: f64,
    ) -> Result<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO sources (name, feed_url, weight)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                feed_url = excluded.feed_url,
                weight = excluded.weight
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(feed_url)
        .bind(weight)
        .fetch_one(self.pool())
        .await?
        .get::<i64, _>("id");

        debug!(target: TARGET_DB, "Source added/updated: {} with id {}", name, id);

        Ok(id)
    }

    /// Gets a source by id, or None when it no longer exists
    pub async fn get_source(&self, source_id: i64) -> Result<Option<Source>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, feed_url, weight FROM sources
            WHERE id = ?
            "#,
        )
        .bind(source_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| Source {
            id: row.get("id"),
            name: row.get("name"),
            feed_url: row.get("feed_url"),
            weight: row.get("weight"),
        }))
    }
}
