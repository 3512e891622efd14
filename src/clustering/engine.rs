use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::db::Database;
use crate::scoring::compute_heat_score;
use crate::similarity::SimilarityOracle;
use crate::{TARGET_CLUSTERING, TARGET_ORACLE};

use super::types::MatchStatus;

/// Assigns a newly ingested article to the most appropriate event
///
/// This function:
/// 1. Loads the active events updated within the configured window
/// 2. Scores the article against each candidate with the similarity oracle
/// 3. Confirms the best match, marks it pending, or creates a new event,
///    depending on where the best score falls relative to the thresholds
/// 4. Recomputes the affected event's heat score on confirmed matches
///
/// Oracle failures on individual comparisons are logged and treated as
/// non-matches; store failures propagate. Calling this twice for the same
/// article is not idempotent — callers invoke it exactly once per article.
///
/// # Arguments
/// * `db` - Database instance
/// * `oracle` - Similarity oracle to score candidate events with
/// * `config` - Engine thresholds and scoring parameters
/// * `article_id` - ID of the article to process
///
/// # Returns
/// * `Ok(event_id)` - The ID of the event the article was assigned to
/// * `Err` - If the article is missing or the store fails
pub async fn process_article(
    db: &Database,
    oracle: &dyn SimilarityOracle,
    config: &EngineConfig,
    article_id: i64,
) -> Result<i64> {
    let article = db.get_article(article_id).await?;
    let now = Utc::now();

    let since = now - Duration::hours(config.active_window_hours);
    let candidates = db.find_active_events(since).await?;

    let article_text = article.comparison_text();

    // Track the best-scoring candidate; ties keep the first-seen maximum
    let mut best: Option<(i64, f64)> = None;

    for event in &candidates {
        match oracle.similarity(&article_text, &event.comparison_text()).await {
            Ok(score) => {
                debug!(
                    target: TARGET_CLUSTERING,
                    "Article {} vs event {}: similarity {:.4}",
                    article.id, event.id, score
                );
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((event.id, score));
                }
            }
            Err(e) => {
                // A failed comparison is a non-match, never fatal
                warn!(
                    target: TARGET_ORACLE,
                    "Similarity comparison failed for article {} vs event {}: {}",
                    article.id, event.id, e
                );
            }
        }
    }

    match best {
        Some((event_id, score)) if score > config.pending_threshold => {
            if score > config.match_threshold {
                info!(
                    target: TARGET_CLUSTERING,
                    "Assigning article {} to existing event {} (similarity: {:.4})",
                    article.id, event_id, score
                );

                db.update_article_match(article.id, event_id, score, MatchStatus::Confirmed)
                    .await?;
                db.touch_event(event_id, now).await?;
                rescore_event(db, event_id, now, config).await?;
            } else {
                info!(
                    target: TARGET_CLUSTERING,
                    "Marking article {} pending against event {} (similarity: {:.4})",
                    article.id, event_id, score
                );

                // Pending matches await human review and must not refresh
                // the event or inflate its heat score
                db.update_article_match(article.id, event_id, score, MatchStatus::Pending)
                    .await?;
            }

            Ok(event_id)
        }
        _ => {
            match best {
                Some((_, score)) => info!(
                    target: TARGET_CLUSTERING,
                    "Creating new event for article {}: best similarity ({:.4}) below pending threshold",
                    article.id, score
                ),
                None => info!(
                    target: TARGET_CLUSTERING,
                    "Creating new event for article {}: no active events to compare against",
                    article.id
                ),
            }

            let event = db
                .create_event(
                    &article.title,
                    article
                        .description
                        .as_deref()
                        .or(Some(article.title.as_str())),
                    article.heat_score.unwrap_or(1.0),
                    now,
                )
                .await?;

            db.update_article_match(article.id, event.id, 1.0, MatchStatus::Confirmed)
                .await?;

            // The seed score above is provisional; the full recompute is
            // authoritative
            rescore_event(db, event.id, now, config).await?;

            Ok(event.id)
        }
    }
}

/// Recomputes and persists one event's heat score from its confirmed
/// articles
///
/// # Arguments
/// * `db` - Database instance
/// * `event_id` - ID of the event to rescore
/// * `now` - Reference time for decay
/// * `config` - Scoring parameters
///
/// # Returns
/// * `Ok(heat_score)` - The freshly computed score
/// * `Err` - If the event is missing or the store fails
pub async fn rescore_event(
    db: &Database,
    event_id: i64,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<f64> {
    let event = db.get_event(event_id).await?;
    let articles = db.find_confirmed_articles_with_source(event_id).await?;

    let heat_score = compute_heat_score(&event, &articles, now, config);
    db.update_event_heat(event_id, heat_score).await?;

    debug!(
        target: TARGET_CLUSTERING,
        "Event {} rescored: {} confirmed articles, heat {}",
        event_id,
        articles.len(),
        heat_score
    );

    Ok(heat_score)
}
