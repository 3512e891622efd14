use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::info;

use crate::db::Database;
use crate::TARGET_CLUSTERING;

use super::types::{MatchStatus, MergeDecision};

/// Resolves a pending article by confirming the suggested merge or
/// splitting it into its own event
///
/// `Approve` confirms the article on its suggested event and bumps the
/// event's heat score by the article's own contribution. This is an
/// additive shortcut, not the full recompute `process_article` runs on
/// confirmed matches, and it leaves `last_updated_at` alone.
///
/// `Reject` creates a new event seeded from the article and repoints the
/// article at it with full confidence. The seed score is kept as-is.
///
/// Either way the article ends in a `confirmed` terminal state.
///
/// # Arguments
/// * `db` - Database instance
/// * `article_id` - ID of the pending article
/// * `decision` - Approve or reject the suggested merge
///
/// # Returns
/// * `Ok(event_id)` - The ID of the event the article ended up on
/// * `Err` - If the article is missing or not awaiting review
pub async fn resolve_merge(
    db: &Database,
    article_id: i64,
    decision: MergeDecision,
) -> Result<i64> {
    let article = db.get_article(article_id).await?;

    if article.match_status != Some(MatchStatus::Pending) {
        return Err(anyhow!(
            "Article {} is not awaiting merge review",
            article_id
        ));
    }

    match decision {
        MergeDecision::Approve => {
            let event_id = article
                .event_id
                .ok_or_else(|| anyhow!("Pending article {} has no suggested event", article_id))?;

            info!(
                target: TARGET_CLUSTERING,
                "Merge approved: confirming article {} on event {}", article_id, event_id
            );

            db.set_article_match_status(article_id, MatchStatus::Confirmed)
                .await?;
            db.bump_event_heat(event_id, article.heat_score.unwrap_or(1.0))
                .await?;

            Ok(event_id)
        }
        MergeDecision::Reject => {
            let now = Utc::now();
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

            info!(
                target: TARGET_CLUSTERING,
                "Merge rejected: article {} split into new event {}", article_id, event.id
            );

            db.update_article_match(article_id, event.id, 1.0, MatchStatus::Confirmed)
                .await?;

            Ok(event.id)
        }
    }
}
