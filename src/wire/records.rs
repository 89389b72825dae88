use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{FeedError, Result};
use crate::types::{
    BannerRow, EventPartScore, LocationRow, MainMarketRow, MarketOutcomeRelation, MarketRow,
    MatchRow, OfferRow, OutcomeRow, TournamentRow,
};

static RECORD_FAILURES: AtomicU64 = AtomicU64::new(0);

/// One record of the aggregator envelope, discriminated by the `_type` field.
///
/// The feed's schema evolves independently of the client, so everything the
/// decoder does not recognize — a new tag, or a known tag whose body fails to
/// deserialize — becomes `Unknown` and is skipped, never failing the batch.
#[derive(Debug, Clone)]
pub enum TaggedRecord {
    Tournament(TournamentRow),
    Match(MatchRow),
    Market(MarketRow),
    Outcome(OutcomeRow),
    BettingOffer(OfferRow),
    MainMarket(MainMarketRow),
    MarketOutcomeRelation(MarketOutcomeRelation),
    Location(LocationRow),
    Banner(BannerRow),
    /// Recognized but not stored — no entity table exposes cashout values.
    Cashout { id: String },
    /// Recognized but not stored — the generic event record duplicates what
    /// MATCH already carries.
    Event { id: String },
    /// Live score fragment, folded into the owning match row.
    EventPartScore(EventPartScore),
    Unknown { kind: String },
}

/// One wire batch: an ordered array of tagged records.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub version: Option<String>,
    pub message_type: Option<String>,
    pub records: Vec<TaggedRecord>,
    /// Records in this envelope that could not be decoded. They are also
    /// present in `records` as `Unknown`.
    pub malformed: usize,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    version: Option<String>,
    #[serde(rename = "messageType")]
    message_type: Option<String>,
    #[serde(default)]
    content: Vec<Value>,
}

/// Parse a raw feed frame into an envelope.
///
/// Fails only when the outer object itself is not valid JSON or lacks the
/// envelope shape; individual records decode independently and degrade to
/// `TaggedRecord::Unknown` on error.
pub fn parse_envelope(raw: &str) -> Result<Envelope> {
    let raw_env: RawEnvelope = serde_json::from_str(raw)
        .map_err(|e| FeedError::Envelope(format!("not an aggregator envelope: {e}")))?;

    let mut records = Vec::with_capacity(raw_env.content.len());
    let mut malformed = 0usize;
    for value in raw_env.content {
        let record = decode_record(value);
        if matches!(record, TaggedRecord::Unknown { .. }) {
            malformed += 1;
        }
        records.push(record);
    }

    Ok(Envelope {
        version: raw_env.version,
        message_type: raw_env.message_type,
        records,
        malformed,
    })
}

fn decode_record(value: Value) -> TaggedRecord {
    let kind = match value.get("_type").and_then(Value::as_str) {
        Some(k) => k.to_string(),
        None => {
            record_failure("<missing _type>", &value);
            return TaggedRecord::Unknown {
                kind: "<missing _type>".to_string(),
            };
        }
    };

    let decoded = match kind.as_str() {
        "TOURNAMENT" => serde_json::from_value(value.clone()).map(TaggedRecord::Tournament),
        "MATCH" => serde_json::from_value(value.clone()).map(TaggedRecord::Match),
        "MARKET" => serde_json::from_value(value.clone()).map(TaggedRecord::Market),
        "OUTCOME" => serde_json::from_value(value.clone()).map(TaggedRecord::Outcome),
        "BETTING_OFFER" => serde_json::from_value(value.clone()).map(TaggedRecord::BettingOffer),
        "MAIN_MARKET" => serde_json::from_value(value.clone()).map(TaggedRecord::MainMarket),
        "MARKET_OUTCOME_RELATION" => {
            serde_json::from_value(value.clone()).map(TaggedRecord::MarketOutcomeRelation)
        }
        "LOCATION" => serde_json::from_value(value.clone()).map(TaggedRecord::Location),
        "BANNER" => serde_json::from_value(value.clone()).map(TaggedRecord::Banner),
        "CASHOUT" => Ok(TaggedRecord::Cashout {
            id: id_of(&value),
        }),
        "EVENT" => Ok(TaggedRecord::Event {
            id: id_of(&value),
        }),
        "EVENT_PART_SCORE" => serde_json::from_value(value.clone()).map(TaggedRecord::EventPartScore),
        _ => return TaggedRecord::Unknown { kind },
    };

    match decoded {
        Ok(record) => record,
        Err(_) => {
            record_failure(&kind, &value);
            TaggedRecord::Unknown { kind }
        }
    }
}

fn id_of(value: &Value) -> String {
    value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn record_failure(kind: &str, value: &Value) {
    let count = RECORD_FAILURES.fetch_add(1, Ordering::Relaxed) + 1;
    if count <= 10 || count % 1000 == 0 {
        let sample = value.to_string();
        let sample = &sample[..300.min(sample.len())];
        warn!(count, kind, "[WIRE] undecodable record: {sample}");
    }
}
