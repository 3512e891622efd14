use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;

use crate::clustering::{process_article, resolve_merge, MatchStatus, MergeDecision};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::similarity::SimilarityOracle;

/// Oracle returning the same score for every comparison
struct FixedOracle(f64);

#[async_trait]
impl SimilarityOracle for FixedOracle {
    async fn similarity(&self, _text_a: &str, _text_b: &str) -> Result<f64> {
        Ok(self.0)
    }
}

/// Oracle scripted per event text
struct ScriptedOracle(HashMap<String, f64>);

#[async_trait]
impl SimilarityOracle for ScriptedOracle {
    async fn similarity(&self, _text_a: &str, text_b: &str) -> Result<f64> {
        self.0
            .get(text_b)
            .copied()
            .ok_or_else(|| anyhow!("No scripted score for '{}'", text_b))
    }
}

/// Oracle whose backend is down
struct FailingOracle;

#[async_trait]
impl SimilarityOracle for FailingOracle {
    async fn similarity(&self, _text_a: &str, _text_b: &str) -> Result<f64> {
        Err(anyhow!("similarity backend offline"))
    }
}

/// Oracle that fails the test when consulted at all
struct UnreachableOracle;

#[async_trait]
impl SimilarityOracle for UnreachableOracle {
    async fn similarity(&self, _text_a: &str, _text_b: &str) -> Result<f64> {
        panic!("oracle must not be consulted");
    }
}

async fn test_db() -> Database {
    Database::in_memory().await.expect("in-memory database")
}

async fn seed_event(db: &Database, title: &str, heat: f64, hours_ago: i64) -> i64 {
    let when = Utc::now() - Duration::hours(hours_ago);
    db.create_event(title, None, heat, when)
        .await
        .unwrap()
        .id
}

async fn seed_article(db: &Database, title: &str, source_id: Option<i64>) -> i64 {
    db.add_article(
        title,
        Some("与党が新たな経済対策を閣議決定"),
        None,
        source_id,
        Some(Utc::now()),
        None,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_no_active_events_creates_new_event() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let source_id = db.add_source("NHK", None, 1.0).await.unwrap();
    let article_id = seed_article(&db, "臨時国会が召集", Some(source_id)).await;

    let event_id = process_article(&db, &UnreachableOracle, &config, article_id)
        .await
        .unwrap();

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.event_id, Some(event_id));
    assert_eq!(article.match_confidence, Some(1.0));
    assert_eq!(article.match_status, Some(MatchStatus::Confirmed));

    let event = db.get_event(event_id).await.unwrap();
    assert_eq!(event.title, "臨時国会が召集");
    assert_eq!(
        event.summary.as_deref(),
        Some("与党が新たな経済対策を閣議決定")
    );
    assert_eq!(event.last_updated_at, Some(event.first_seen_at));
    // one confirmed source, weight 1.0, no decay
    assert_eq!(event.heat_score, 10.0);
}

#[tokio::test]
async fn test_new_event_summary_falls_back_to_title() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let article_id = db
        .add_article("官房長官が会見", None, None, None, None, None)
        .await
        .unwrap();

    let event_id = process_article(&db, &UnreachableOracle, &config, article_id)
        .await
        .unwrap();

    let event = db.get_event(event_id).await.unwrap();
    assert_eq!(event.summary.as_deref(), Some("官房長官が会見"));
}

#[tokio::test]
async fn test_new_event_seed_is_overwritten_by_recompute() {
    let db = test_db().await;
    let config = EngineConfig::default();
    // unsourced article: the seed of 5 must give way to a recomputed 0
    let article_id = db
        .add_article("談話発表", None, None, None, None, Some(5.0))
        .await
        .unwrap();

    let event_id = process_article(&db, &UnreachableOracle, &config, article_id)
        .await
        .unwrap();

    let event = db.get_event(event_id).await.unwrap();
    assert_eq!(event.heat_score, 0.0);
}

#[tokio::test]
async fn test_high_similarity_confirms_and_rescores() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let event_id = seed_event(&db, "内閣改造", 999.0, 1).await;
    let before = db.get_event(event_id).await.unwrap();

    let source_id = db.add_source("朝日新聞", None, 1.0).await.unwrap();
    let article_id = seed_article(&db, "内閣改造で新大臣が就任", Some(source_id)).await;

    let assigned = process_article(&db, &FixedOracle(0.9), &config, article_id)
        .await
        .unwrap();
    assert_eq!(assigned, event_id);

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.event_id, Some(event_id));
    assert_eq!(article.match_confidence, Some(0.9));
    assert_eq!(article.match_status, Some(MatchStatus::Confirmed));

    let after = db.get_event(event_id).await.unwrap();
    assert!(after.last_updated_at > before.last_updated_at);
    // full recompute, not an increment on the stale 999
    assert_eq!(after.heat_score, 10.0);
}

#[tokio::test]
async fn test_mid_similarity_marks_pending_without_touching_event() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let event_id = seed_event(&db, "内閣改造", 42.0, 1).await;
    let before = db.get_event(event_id).await.unwrap();

    let article_id = seed_article(&db, "改造内閣の顔ぶれ", None).await;

    let assigned = process_article(&db, &FixedOracle(0.7), &config, article_id)
        .await
        .unwrap();
    assert_eq!(assigned, event_id);

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.match_status, Some(MatchStatus::Pending));
    assert_eq!(article.match_confidence, Some(0.7));

    let after = db.get_event(event_id).await.unwrap();
    assert_eq!(after.last_updated_at, before.last_updated_at);
    assert_eq!(after.heat_score, 42.0);
}

#[tokio::test]
async fn test_score_at_pending_threshold_creates_new_event() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let existing = seed_event(&db, "予算委員会", 0.0, 1).await;

    let article_id = seed_article(&db, "全く別の話題", None).await;

    // strict inequality: exactly 0.60 is not enough to suggest a merge
    let assigned = process_article(&db, &FixedOracle(0.60), &config, article_id)
        .await
        .unwrap();
    assert_ne!(assigned, existing);

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.event_id, Some(assigned));
    assert_eq!(article.match_confidence, Some(1.0));
    assert_eq!(article.match_status, Some(MatchStatus::Confirmed));
}

#[tokio::test]
async fn test_score_at_match_threshold_stays_pending() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let event_id = seed_event(&db, "党首討論", 0.0, 1).await;

    let article_id = seed_article(&db, "党首討論が開催", None).await;

    // strict inequality: exactly 0.85 is a suggestion, not a confirmation
    let assigned = process_article(&db, &FixedOracle(0.85), &config, article_id)
        .await
        .unwrap();
    assert_eq!(assigned, event_id);

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.match_status, Some(MatchStatus::Pending));
}

#[tokio::test]
async fn test_oracle_failure_falls_back_to_new_event() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let existing = seed_event(&db, "外交訪問", 0.0, 1).await;

    let article_id = seed_article(&db, "首脳会談の日程", None).await;

    let assigned = process_article(&db, &FailingOracle, &config, article_id)
        .await
        .unwrap();
    assert_ne!(assigned, existing);

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.match_status, Some(MatchStatus::Confirmed));
    assert_eq!(article.match_confidence, Some(1.0));
}

#[tokio::test]
async fn test_stale_events_are_never_candidates() {
    let db = test_db().await;
    let config = EngineConfig::default();
    // outside the 48 hour window; the oracle would panic if consulted
    let stale = seed_event(&db, "過去の話題", 0.0, 72).await;

    let article_id = seed_article(&db, "過去の話題", None).await;

    let assigned = process_article(&db, &UnreachableOracle, &config, article_id)
        .await
        .unwrap();
    assert_ne!(assigned, stale);
}

#[tokio::test]
async fn test_best_scoring_event_wins() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let closer = seed_event(&db, "選挙制度改革", 0.0, 2).await;
    seed_event(&db, "税制改正", 0.0, 1).await;

    let scores = HashMap::from([
        ("選挙制度改革".to_string(), 0.95),
        ("税制改正".to_string(), 0.90),
    ]);

    let article_id = seed_article(&db, "選挙制度改革法案が提出", None).await;
    let assigned = process_article(&db, &ScriptedOracle(scores), &config, article_id)
        .await
        .unwrap();
    assert_eq!(assigned, closer);
}

#[tokio::test]
async fn test_tied_scores_keep_first_seen_maximum() {
    let db = test_db().await;
    let config = EngineConfig::default();
    // candidates come back most recently updated first
    let second = seed_event(&db, "普天間移設", 0.0, 2).await;
    let first = seed_event(&db, "辺野古工事", 0.0, 1).await;
    assert!(first > second);

    let article_id = seed_article(&db, "沖縄基地問題", None).await;
    let assigned = process_article(&db, &FixedOracle(0.9), &config, article_id)
        .await
        .unwrap();
    assert_eq!(assigned, first);
}

#[tokio::test]
async fn test_resolve_approve_confirms_and_bumps_additively() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let event_id = seed_event(&db, "日銀の金融政策", 42.0, 1).await;
    let before = db.get_event(event_id).await.unwrap();

    let article_id = db
        .add_article("金利据え置きを決定", None, None, None, None, Some(3.0))
        .await
        .unwrap();
    process_article(&db, &FixedOracle(0.7), &config, article_id)
        .await
        .unwrap();

    let resolved = resolve_merge(&db, article_id, MergeDecision::Approve)
        .await
        .unwrap();
    assert_eq!(resolved, event_id);

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.match_status, Some(MatchStatus::Confirmed));
    assert_eq!(article.event_id, Some(event_id));

    let after = db.get_event(event_id).await.unwrap();
    // additive bump by the article's own contribution, no recompute
    assert_eq!(after.heat_score, 45.0);
    assert_eq!(after.last_updated_at, before.last_updated_at);
}

#[tokio::test]
async fn test_resolve_approve_defaults_bump_to_one() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let event_id = seed_event(&db, "憲法審査会", 10.0, 1).await;

    let article_id = seed_article(&db, "憲法審査会が再開", None).await;
    process_article(&db, &FixedOracle(0.7), &config, article_id)
        .await
        .unwrap();

    resolve_merge(&db, article_id, MergeDecision::Approve)
        .await
        .unwrap();

    let after = db.get_event(event_id).await.unwrap();
    assert_eq!(after.heat_score, 11.0);
}

#[tokio::test]
async fn test_resolve_reject_splits_into_new_event() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let suggested = seed_event(&db, "補正予算案", 0.0, 1).await;

    let article_id = db
        .add_article(
            "補正予算とは無関係の記事",
            Some("知事選の情勢"),
            None,
            None,
            None,
            Some(2.0),
        )
        .await
        .unwrap();
    process_article(&db, &FixedOracle(0.7), &config, article_id)
        .await
        .unwrap();

    let new_event_id = resolve_merge(&db, article_id, MergeDecision::Reject)
        .await
        .unwrap();
    assert_ne!(new_event_id, suggested);

    let article = db.get_article(article_id).await.unwrap();
    assert_eq!(article.event_id, Some(new_event_id));
    assert_eq!(article.match_confidence, Some(1.0));
    assert_eq!(article.match_status, Some(MatchStatus::Confirmed));

    let event = db.get_event(new_event_id).await.unwrap();
    assert_eq!(event.title, "補正予算とは無関係の記事");
    assert_eq!(event.summary.as_deref(), Some("知事選の情勢"));
    // seeded from the article, deliberately not recomputed
    assert_eq!(event.heat_score, 2.0);
}

#[tokio::test]
async fn test_resolve_rejects_non_pending_articles() {
    let db = test_db().await;
    let config = EngineConfig::default();

    // never processed
    let unprocessed = seed_article(&db, "未処理の記事", None).await;
    assert!(resolve_merge(&db, unprocessed, MergeDecision::Approve)
        .await
        .is_err());

    // already confirmed
    let confirmed = seed_article(&db, "確定済みの記事", None).await;
    process_article(&db, &UnreachableOracle, &config, confirmed)
        .await
        .unwrap();
    assert!(resolve_merge(&db, confirmed, MergeDecision::Reject)
        .await
        .is_err());
}

#[tokio::test]
async fn test_unprocessed_listing_shrinks_as_articles_are_processed() {
    let db = test_db().await;
    let config = EngineConfig::default();
    let a = seed_article(&db, "記事A", None).await;
    let b = seed_article(&db, "記事B", None).await;

    assert_eq!(db.find_unprocessed_articles(None).await.unwrap(), vec![a, b]);

    process_article(&db, &UnreachableOracle, &config, a)
        .await
        .unwrap();
    assert_eq!(db.find_unprocessed_articles(None).await.unwrap(), vec![b]);
}
