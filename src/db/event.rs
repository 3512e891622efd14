use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{self, Row};
use tracing::{debug, instrument};

use super::core::Database;
use crate::clustering::{Event, EventStatus};
use crate::TARGET_DB;

/// Maps an `events` row to an `Event`, parsing timestamps and status
fn event_from_row(row: &SqliteRow) -> Result<Event> {
    let status_str: String = row.get("status");
    let status = EventStatus::parse(&status_str)
        .ok_or_else(|| anyhow!("Unknown event status '{}'", status_str))?;

    let first_seen_at: String = row.get("first_seen_at");
    let first_seen_at = DateTime::parse_from_rfc3339(&first_seen_at)
        .map_err(|_| anyhow!("Invalid first_seen_at date format"))?
        .with_timezone(&Utc);

    let last_updated_at: Option<String> = row.get("last_updated_at");
    let last_updated_at = match last_updated_at {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|_| anyhow!("Invalid last_updated_at date format"))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(Event {
        id: row.get("id"),
        title: row.get("title"),
        summary: row.get("summary"),
        heat_score: row.get("heat_score"),
        first_seen_at,
        last_updated_at,
        status,
    })
}

impl Database {
    /// Gets a single event by id
    pub async fn get_event(&self, event_id: i64) -> Result<Event> {
        let row = sqlx::query(
            r#"
            SELECT id, title, summary, heat_score, first_seen_at, last_updated_at, status
            FROM events
            WHERE id = ?
            "#,
        )
        .bind(event_id)
        .fetch_one(self.pool())
        .await?;

        event_from_row(&row)
    }

    /// Finds active events updated at or after the given cutoff
    ///
    /// Events outside the window are implicitly closed to new matches; this
    /// bounds the candidate set the clustering engine compares against.
    pub async fn find_active_events(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, summary, heat_score, first_seen_at, last_updated_at, status
            FROM events
            WHERE status = 'active'
              AND last_updated_at IS NOT NULL
              AND last_updated_at >= ?
            ORDER BY last_updated_at DESC
            "#,
        )
        .bind(since.to_rfc3339())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    /// Finds every active event regardless of age, for maintenance rescoring
    pub async fn all_active_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, summary, heat_score, first_seen_at, last_updated_at, status
            FROM events
            WHERE status = 'active'
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    /// Lists the hottest active events
    pub async fn top_events(&self, limit: usize) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, summary, heat_score, first_seen_at, last_updated_at, status
            FROM events
            WHERE status = 'active'
            ORDER BY heat_score DESC, last_updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    /// Creates a new active event and returns it
    ///
    /// `first_seen_at` and `last_updated_at` are both set to `now`.
    #[instrument(target = "db", level = "info", skip(self, summary))]
    pub async fn create_event(
        &self,
        title: &str,
        summary: Option<&str>,
        heat_score: f64,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        let now_str = now.to_rfc3339();

        let event_id = sqlx::query(
            r#"
            INSERT INTO events (title, summary, heat_score, first_seen_at, last_updated_at, status)
            VALUES (?, ?, ?, ?, ?, 'active')
            "#,
        )
        .bind(title)
        .bind(summary)
        .bind(heat_score)
        .bind(&now_str)
        .bind(&now_str)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        debug!(target: TARGET_DB, "Created new event {} ({})", event_id, title);

        self.get_event(event_id).await
    }

    /// Refreshes an event's last_updated_at timestamp
    pub async fn touch_event(&self, event_id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET last_updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(event_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Overwrites an event's heat score with a freshly computed value
    pub async fn update_event_heat(&self, event_id: i64, heat_score: f64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET heat_score = ?
            WHERE id = ?
            "#,
        )
        .bind(heat_score)
        .bind(event_id)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Event {} heat score set to {}", event_id, heat_score);

        Ok(())
    }

    /// Adds a delta to an event's heat score without recomputing it
    ///
    /// Used by the approve path of merge resolution, which deliberately
    /// bumps rather than recomputes.
    pub async fn bump_event_heat(&self, event_id: i64, delta: f64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET heat_score = heat_score + ?
            WHERE id = ?
            "#,
        )
        .bind(delta)
        .bind(event_id)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Event {} heat score bumped by {}", event_id, delta);

        Ok(())
    }
}
