use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Match state of an article relative to its event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Confirmed,
    Pending,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Pending => "pending",
            MatchStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<MatchStatus> {
        match s {
            "confirmed" => Some(MatchStatus::Confirmed),
            "pending" => Some(MatchStatus::Pending),
            "rejected" => Some(MatchStatus::Rejected),
            _ => None,
        }
    }
}

/// Lifecycle state of an event; the engine only creates and reads `Active`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Active,
    Archived,
    Merged,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Archived => "archived",
            EventStatus::Merged => "merged",
        }
    }

    pub fn parse(s: &str) -> Option<EventStatus> {
        match s {
            "active" => Some(EventStatus::Active),
            "archived" => Some(EventStatus::Archived),
            "merged" => Some(EventStatus::Merged),
            _ => None,
        }
    }
}

/// Operator decision on a pending article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Approve,
    Reject,
}

/// Struct representing an ongoing news story
///
/// Invariant: `last_updated_at >= first_seen_at` whenever both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub heat_score: f64,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub status: EventStatus,
}

/// Struct representing one ingested article
///
/// `event_id`, `match_confidence` and `match_status` are all null until the
/// clustering engine has processed the article, and all set afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub source_id: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub event_id: Option<i64>,
    pub match_confidence: Option<f64>,
    pub match_status: Option<MatchStatus>,
    pub heat_score: Option<f64>,
}

/// Struct representing a feed source; read-only to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub feed_url: Option<String>,
    pub weight: f64,
}

impl Article {
    /// Text the similarity oracle compares: title plus description
    pub fn comparison_text(&self) -> String {
        format!(
            "{} {}",
            self.title,
            self.description.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

impl Event {
    /// Text the similarity oracle compares: title plus summary
    pub fn comparison_text(&self) -> String {
        format!("{} {}", self.title, self.summary.as_deref().unwrap_or(""))
            .trim()
            .to_string()
    }
}
