use super::core::Database;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                feed_url TEXT,
                weight REAL NOT NULL DEFAULT 1.0
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                summary TEXT,
                heat_score REAL NOT NULL DEFAULT 0,
                first_seen_at TEXT NOT NULL,
                last_updated_at TEXT,
                status TEXT NOT NULL DEFAULT 'active'
            );
            CREATE INDEX IF NOT EXISTS idx_events_status_last_updated ON events (status, last_updated_at);
            CREATE INDEX IF NOT EXISTS idx_events_heat_score ON events (heat_score);

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                url TEXT,
                source_id INTEGER REFERENCES sources (id),
                published_at TEXT,
                event_id INTEGER REFERENCES events (id),
                match_confidence REAL,
                match_status TEXT,
                heat_score REAL
            );
            CREATE INDEX IF NOT EXISTS idx_articles_event_id ON articles (event_id);
            CREATE INDEX IF NOT EXISTS idx_articles_match_status ON articles (match_status);
            CREATE INDEX IF NOT EXISTS idx_articles_source_id ON articles (source_id);
            CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles (published_at);
            "#,
        )
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
