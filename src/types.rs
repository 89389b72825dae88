use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Entity rows — flat, normalized, exactly as stored in the entity tables.
// Ids are opaque strings assigned by the feed.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    NotStarted,
    Live,
    Suspended,
    Ended,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStatus::NotStarted => "not_started",
            MatchStatus::Live => "live",
            MatchStatus::Suspended => "suspended",
            MatchStatus::Ended => "ended",
            MatchStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRow {
    pub id: String,
    pub sport_id: String,
    pub tournament_id: String,
    #[serde(default)]
    pub tournament_name: Option<String>,
    #[serde(default)]
    pub venue_id: Option<String>,
    /// Epoch milliseconds.
    pub start_time: i64,
    pub status: MatchStatus,
    pub home_participant_id: String,
    pub home_participant_name: String,
    pub away_participant_id: String,
    pub away_participant_name: String,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRow {
    pub id: String,
    /// Owning match id. The feed calls matches "events" on market records.
    pub event_id: String,
    /// Market type, ranked by the sport's main-market descriptors.
    pub betting_type_id: String,
    pub name: String,
    pub is_available: bool,
    #[serde(default)]
    pub is_closed: bool,
    /// Line parameter for over/under and handicap markets.
    #[serde(default)]
    pub param_line: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRow {
    pub id: String,
    pub market_id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    pub code: String,
    /// Numeric sort parameter (over/under line, handicap value).
    #[serde(default)]
    pub param_line: Option<f64>,
}

/// The mutable price. Highest-churn entity in the store — the per-entity
/// fan-out exists primarily so one odds button can follow one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRow {
    pub id: String,
    pub outcome_id: String,
    pub odds: f64,
    pub is_open: bool,
    /// Epoch milliseconds of the last server-side change.
    #[serde(default)]
    pub last_changed_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentRow {
    pub id: String,
    pub sport_id: String,
    pub location_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Ranking record: for a sport, which betting types count as "main" markets
/// and in what display order. Consumed by indices only, never exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainMarketRow {
    pub id: String,
    pub sport_id: String,
    pub betting_type_id: String,
    #[serde(default)]
    pub betting_type_name: Option<String>,
    #[serde(default)]
    pub live_market: bool,
}

/// Auxiliary join record linking a market to one of its outcomes. Consumed by
/// indices only, never exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOutcomeRelation {
    pub id: String,
    pub market_id: String,
    pub outcome_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

/// Live score fragment for one match. Not an entity — folded into the
/// match row on arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPartScore {
    pub event_id: String,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
}

// ---------------------------------------------------------------------------
// Topics — a consumer's request for a slice of live data, independent of the
// physical connection that serves it.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Live,
    Today,
    Upcoming,
    Popular,
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ListKind::Live => "live",
            ListKind::Today => "today",
            ListKind::Upcoming => "upcoming",
            ListKind::Popular => "popular",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub sport_id: String,
    pub list_kind: ListKind,
    pub page_size: u32,
    /// Server-side filter key (e.g. a tournament or time-range filter).
    pub filter_key: Option<String>,
}

impl Topic {
    pub fn new(sport_id: impl Into<String>, list_kind: ListKind, page_size: u32) -> Self {
        Self {
            sport_id: sport_id.into(),
            list_kind,
            page_size,
            filter_key: None,
        }
    }

    pub fn with_filter(mut self, filter_key: impl Into<String>) -> Self {
        self.filter_key = Some(filter_key.into());
        self
    }

    /// Connection identity: topics that differ only in page size still use
    /// separate connections (the server pages the snapshot).
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.sport_id,
            self.list_kind,
            self.filter_key.as_deref().unwrap_or("-"),
            self.page_size,
        )
    }

    /// List-membership identity in the store — page size excluded, so a
    /// re-subscribe with a larger page re-scopes the same list.
    pub fn scope(&self) -> String {
        format!(
            "{}:{}:{}",
            self.sport_id,
            self.list_kind,
            self.filter_key.as_deref().unwrap_or("-"),
        )
    }
}

/// Full request sent upstream when opening a topic connection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRequest {
    pub operator_id: String,
    pub language: String,
    pub sport_id: String,
    pub list_kind: ListKind,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_key: Option<String>,
}

impl TopicRequest {
    pub fn new(operator_id: &str, language: &str, topic: &Topic) -> Self {
        Self {
            operator_id: operator_id.to_string(),
            language: language.to_string(),
            sport_id: topic.sport_id.clone(),
            list_kind: topic.list_kind,
            page_size: topic.page_size,
            filter_key: topic.filter_key.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle events — sent over each consumer's mpsc channel
// ---------------------------------------------------------------------------

/// What one applied batch touched. Carried on `InitialContent` /
/// `UpdatedContent` so list consumers can re-page without re-scanning tables.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Top-level (match) ids seen in the batch, in feed order.
    pub match_ids: Vec<String>,
    pub records_applied: usize,
    pub records_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the stream or the transport failed mid-stream.
    Closed,
    /// The initial snapshot never arrived within the configured timeout.
    SnapshotTimeout,
    Transport(String),
    /// This consumer unsubscribed; its event stream ends here.
    Unsubscribed,
}

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Connected,
    InitialContent(Arc<BatchSummary>),
    UpdatedContent(Arc<BatchSummary>),
    Disconnected(DisconnectReason),
}
