use std::time::Duration;

use crate::error::{FeedError, Result};

pub const DEFAULT_WS_URL: &str = "wss://odds-aggregator.example.com/feed";

/// Heartbeat ping interval (seconds).
pub const WS_PING_INTERVAL_SECS: u64 = 30;

/// A topic that has not delivered its initial snapshot within this window is
/// failed with a `SnapshotTimeout` and surfaced as `Disconnected` — a topic
/// must never hang silently.
pub const SNAPSHOT_TIMEOUT_SECS: u64 = 10;

/// How long a topic with zero consumers lingers before its connection is torn
/// down. A re-subscribe inside this window cancels the pending teardown
/// instead of opening a duplicate connection.
pub const CLOSE_GRACE_MS: u64 = 250;

/// Capacity of each consumer's lifecycle event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the per-connection envelope channel between the socket reader
/// and the topic driver.
pub const FRAME_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on orphaned child relations held while their parent entity has
/// not arrived. Past this bound orphans are dropped and counted — the feed's
/// record ordering is an informal convention, not a contract, so the buffer
/// must not grow without limit on a reference that never resolves.
pub const PENDING_RELATION_CAP: usize = 4096;

#[derive(Debug, Clone)]
pub struct Config {
    pub ws_url: String,
    /// Operator id sent with every topic request (FEED_OPERATOR_ID).
    pub operator_id: String,
    /// Language code sent with every topic request (FEED_LANGUAGE).
    pub language: String,
    pub log_level: String,
    pub snapshot_timeout: Duration,
    pub close_grace: Duration,
    pub pending_relation_cap: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            ws_url: std::env::var("FEED_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string()),
            operator_id: std::env::var("FEED_OPERATOR_ID")
                .map_err(|_| FeedError::Config("FEED_OPERATOR_ID must be set".to_string()))?,
            language: std::env::var("FEED_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            snapshot_timeout: Duration::from_secs(
                std::env::var("FEED_SNAPSHOT_TIMEOUT_SECS")
                    .unwrap_or_default()
                    .parse::<u64>()
                    .unwrap_or(SNAPSHOT_TIMEOUT_SECS),
            ),
            close_grace: Duration::from_millis(
                std::env::var("FEED_CLOSE_GRACE_MS")
                    .unwrap_or_default()
                    .parse::<u64>()
                    .unwrap_or(CLOSE_GRACE_MS),
            ),
            pending_relation_cap: std::env::var("FEED_PENDING_RELATION_CAP")
                .unwrap_or_default()
                .parse::<usize>()
                .unwrap_or(PENDING_RELATION_CAP),
        })
    }
}
