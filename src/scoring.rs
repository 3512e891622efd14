use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::clustering::{Article, Event, MatchStatus, Source};
use crate::config::EngineConfig;

/// One source's share of an event's raw heat score
#[derive(Debug, Clone, Serialize)]
pub struct SourceContribution {
    pub source_id: i64,
    /// The article that carried this source's contribution (its newest)
    pub article_id: i64,
    pub weight: f64,
    pub points: f64,
}

/// Intermediate values behind a heat score, for display and auditing
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub raw_score: f64,
    pub decay_factor: f64,
    pub final_score: f64,
    pub source_count: usize,
    pub contributions: Vec<SourceContribution>,
}

/// Exponential decay multiplier for an event's age.
///
/// Equals 1.0 for a just-updated event (or one with no update timestamp),
/// `decay_rate` after one decay period, and approaches 0 asymptotically.
/// Never negative.
pub fn decay_factor(
    last_updated_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> f64 {
    let last_updated_at = match last_updated_at {
        Some(t) => t,
        None => return 1.0,
    };

    let hours_since_update = ((now - last_updated_at).num_seconds() as f64 / 3600.0).max(0.0);

    config
        .decay_rate
        .powf(hours_since_update / config.decay_period_hours)
}

/// Computes an event's heat score with all intermediate values exposed.
///
/// The algorithm:
/// 1. Only articles with a confirmed match count.
/// 2. One contribution per source: within a source, the article with the
///    latest publication date wins; an undated article loses any tie-break
///    against a dated one, and the first article seen wins otherwise.
///    Unsourced articles are excluded entirely.
/// 3. Each surviving article contributes `base_points * weight`, where the
///    weight falls back to 1.0 when the source row is gone.
/// 4. The sum is decayed by the event's age and rounded to an integer.
///
/// Pure and deterministic; malformed input degrades to 0 rather than
/// erroring.
pub fn score_breakdown(
    event: &Event,
    articles: &[(Article, Option<Source>)],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> ScoreBreakdown {
    let mut per_source: BTreeMap<i64, (&Article, f64)> = BTreeMap::new();

    for (article, source) in articles {
        if article.match_status != Some(MatchStatus::Confirmed) {
            continue;
        }

        let source_id = match article.source_id {
            Some(id) => id,
            None => continue,
        };

        let weight = source.as_ref().map_or(1.0, |s| s.weight);

        match per_source.entry(source_id) {
            Entry::Vacant(slot) => {
                slot.insert((article, weight));
            }
            Entry::Occupied(mut slot) => {
                // None < Some, so an undated article never displaces a dated one
                if article.published_at > slot.get().0.published_at {
                    slot.insert((article, weight));
                }
            }
        }
    }

    let contributions: Vec<SourceContribution> = per_source
        .iter()
        .map(|(&source_id, &(article, weight))| SourceContribution {
            source_id,
            article_id: article.id,
            weight,
            points: config.base_points * weight,
        })
        .collect();

    let raw_score: f64 = contributions.iter().map(|c| c.points).sum();
    let decay = decay_factor(event.last_updated_at, now, config);
    let final_score = (raw_score * decay).round();

    ScoreBreakdown {
        raw_score,
        decay_factor: decay,
        final_score,
        source_count: contributions.len(),
        contributions,
    }
}

/// Computes an event's current heat score from its linked articles.
///
/// Same algorithm as `score_breakdown`; returns only the final rounded
/// value. The caller persists the result.
pub fn compute_heat_score(
    event: &Event,
    articles: &[(Article, Option<Source>)],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> f64 {
    score_breakdown(event, articles, now, config).final_score
}
