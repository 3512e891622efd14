use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::sqlite::SqliteRow;
use sqlx::{self, Row};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, instrument};

use super::core::{Database, DbLockErrorExt};
use crate::clustering::{Article, MatchStatus, Source};
use crate::TARGET_DB;

fn parse_optional_date(raw: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>> {
    match raw {
        Some(s) => Ok(Some(
            DateTime::parse_from_rfc3339(&s)
                .map_err(|_| anyhow!("Invalid {} date format", field))?
                .with_timezone(&Utc),
        )),
        None => Ok(None),
    }
}

/// Maps an `articles` row to an `Article`
fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let match_status: Option<String> = row.get("match_status");
    let match_status = match match_status {
        Some(s) => Some(
            MatchStatus::parse(&s).ok_or_else(|| anyhow!("Unknown match status '{}'", s))?,
        ),
        None => None,
    };

    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        url: row.get("url"),
        source_id: row.get("source_id"),
        published_at: parse_optional_date(row.get("published_at"), "published_at")?,
        event_id: row.get("event_id"),
        match_confidence: row.get("match_confidence"),
        match_status,
        heat_score: row.get("heat_score"),
    })
}

const ARTICLE_COLUMNS: &str =
    "id, title, description, url, source_id, published_at, event_id, match_confidence, match_status, heat_score";

impl Database {
    /// Inserts a newly ingested article, returning its id
    ///
    /// Retries with exponential backoff when the database is locked by a
    /// concurrent writer.
    #[instrument(target = "db", level = "info", skip(self, description, url))]
    pub async fn add_article(
        &self,
        title: &str,
        description: Option<&str>,
        url: Option<&str>,
        source_id: Option<i64>,
        published_at: Option<DateTime<Utc>>,
        heat_score: Option<f64>,
    ) -> Result<i64> {
        debug!(target: TARGET_DB, "Adding article: {}", title);

        let published_at = published_at.map(|d| d.to_rfc3339());
        let mut backoff = 100; // initial delay in milliseconds
        let max_retries = 5;

        for attempt in 1..=max_retries {
            match sqlx::query(
                r#"
                INSERT INTO articles (title, description, url, source_id, published_at, heat_score)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(title)
            .bind(description)
            .bind(url)
            .bind(source_id)
            .bind(&published_at)
            .bind(heat_score)
            .execute(self.pool())
            .await
            {
                Ok(result) => {
                    let id = result.last_insert_rowid();
                    debug!(target: TARGET_DB, "Article added: {} with id {}", title, id);
                    return Ok(id);
                }
                Err(err) => {
                    if err.is_database_lock_error() && attempt < max_retries {
                        info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}", backoff, attempt, max_retries);
                        sleep(Duration::from_millis(backoff)).await;
                        backoff = backoff.saturating_mul(2); // exponential backoff
                        backoff += rand::rng().random_range(0..200); // jitter
                    } else {
                        return Err(err.into());
                    }
                }
            }
        }

        Err(anyhow!("Maximum retries exceeded for adding article"))
    }

    /// Gets a single article by id
    pub async fn get_article(&self, article_id: i64) -> Result<Article> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(article_id)
        .fetch_one(self.pool())
        .await?;

        article_from_row(&row)
    }

    /// Writes the engine's match decision onto an article
    pub async fn update_article_match(
        &self,
        article_id: i64,
        event_id: i64,
        match_confidence: f64,
        match_status: MatchStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET event_id = ?,
                match_confidence = ?,
                match_status = ?
            WHERE id = ?
            "#,
        )
        .bind(event_id)
        .bind(match_confidence)
        .bind(match_status.as_str())
        .bind(article_id)
        .execute(self.pool())
        .await?;

        debug!(
            target: TARGET_DB,
            "Article {} matched to event {} ({}, confidence {:.4})",
            article_id, event_id, match_status.as_str(), match_confidence
        );

        Ok(())
    }

    /// Changes only an article's match status, keeping its event link
    pub async fn set_article_match_status(
        &self,
        article_id: i64,
        match_status: MatchStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET match_status = ?
            WHERE id = ?
            "#,
        )
        .bind(match_status.as_str())
        .bind(article_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Gets an event's confirmed articles joined with their sources
    ///
    /// The source side of each pair is None when the article is unsourced or
    /// its source row has been deleted.
    pub async fn find_confirmed_articles_with_source(
        &self,
        event_id: i64,
    ) -> Result<Vec<(Article, Option<Source>)>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.title, a.description, a.url, a.source_id, a.published_at,
                   a.event_id, a.match_confidence, a.match_status, a.heat_score,
                   s.id AS src_id, s.name AS src_name, s.feed_url AS src_feed_url,
                   s.weight AS src_weight
            FROM articles a
            LEFT JOIN sources s ON a.source_id = s.id
            WHERE a.event_id = ? AND a.match_status = 'confirmed'
            ORDER BY a.id
            "#,
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await?;

        let mut articles = Vec::new();

        for row in rows {
            let article = article_from_row(&row)?;
            let source = match row.get::<Option<i64>, _>("src_id") {
                Some(src_id) => Some(Source {
                    id: src_id,
                    name: row.get("src_name"),
                    feed_url: row.get("src_feed_url"),
                    weight: row.get("src_weight"),
                }),
                None => None,
            };

            articles.push((article, source));
        }

        Ok(articles)
    }

    /// Finds articles the clustering engine has not yet processed
    pub async fn find_unprocessed_articles(&self, limit: Option<usize>) -> Result<Vec<i64>> {
        let rows = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM articles
            WHERE event_id IS NULL AND match_status IS NULL
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        match limit {
            Some(max) => Ok(rows.into_iter().take(max).collect()),
            None => Ok(rows),
        }
    }

    /// Finds articles awaiting human merge review
    pub async fn find_pending_articles(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM articles WHERE match_status = 'pending' ORDER BY id",
            ARTICLE_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(article_from_row).collect()
    }
}
