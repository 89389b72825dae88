use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::store::metrics::StoreMetrics;

/// Parent kinds a child relation can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentKind {
    Match,
    Market,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ParentKey {
    kind: ParentKind,
    id: String,
}

/// A child→parent link that arrived before its parent entity.
#[derive(Debug, Clone)]
enum PendingRelation {
    /// market → outcome membership, parent = market.
    Outcome { outcome_id: String },
    /// match → market membership, parent = match.
    Market { market_id: String },
}

/// Derived relationship indices, maintained incrementally alongside the
/// entity tables — never rebuilt by full recompute.
///
/// Ordered membership vectors use append-if-absent, so re-applying a batch
/// is idempotent. Child links whose parent has not arrived are pended in a
/// bounded buffer and drained when the parent is committed; past the bound
/// they are dropped and counted.
#[derive(Debug)]
pub struct RelationIndices {
    /// market id → ordered outcome ids.
    market_outcomes: DashMap<String, Vec<String>>,
    /// match id → ordered market ids.
    match_markets: DashMap<String, Vec<String>>,
    /// location id → tournament ids.
    location_tournaments: DashMap<String, Vec<String>>,
    /// tournament id → match ids.
    tournament_matches: DashMap<String, Vec<String>>,
    /// outcome id → betting-offer id (1:1).
    offer_by_outcome: DashMap<String, String>,
    /// sport id → betting type ids in main-market display order.
    main_market_order: DashMap<String, Vec<String>>,
    /// list scope → ordered match-id membership.
    list_members: DashMap<String, Vec<String>>,
    /// missing parent → children waiting on it.
    pending: DashMap<ParentKey, Vec<PendingRelation>>,
    pending_len: AtomicUsize,
    pending_cap: usize,
    metrics: Arc<StoreMetrics>,
}

impl RelationIndices {
    pub fn new(pending_cap: usize, metrics: Arc<StoreMetrics>) -> Self {
        Self {
            market_outcomes: DashMap::new(),
            match_markets: DashMap::new(),
            location_tournaments: DashMap::new(),
            tournament_matches: DashMap::new(),
            offer_by_outcome: DashMap::new(),
            main_market_order: DashMap::new(),
            list_members: DashMap::new(),
            pending: DashMap::new(),
            pending_len: AtomicUsize::new(0),
            pending_cap,
            metrics,
        }
    }

    fn append_unique(map: &DashMap<String, Vec<String>>, key: &str, id: &str) {
        let mut entry = map.entry(key.to_string()).or_default();
        if !entry.iter().any(|existing| existing == id) {
            entry.push(id.to_string());
        }
    }

    // -- child links (pend when the parent is absent) ------------------------

    /// Link an outcome under its market. `market_present` reflects the entity
    /// tables at routing time; an absent parent pends the link.
    pub fn link_outcome(&self, market_id: &str, outcome_id: &str, market_present: bool) {
        if market_present {
            Self::append_unique(&self.market_outcomes, market_id, outcome_id);
        } else {
            self.pend(
                ParentKind::Market,
                market_id,
                PendingRelation::Outcome {
                    outcome_id: outcome_id.to_string(),
                },
            );
        }
    }

    /// Link a market under its match.
    pub fn link_market(&self, match_id: &str, market_id: &str, match_present: bool) {
        if match_present {
            Self::append_unique(&self.match_markets, match_id, market_id);
        } else {
            self.pend(
                ParentKind::Match,
                match_id,
                PendingRelation::Market {
                    market_id: market_id.to_string(),
                },
            );
        }
    }

    /// Called by the engine when a parent entity is committed: drain every
    /// child that was waiting on it into the live index.
    pub fn resolve_parent(&self, kind: ParentKind, id: &str) {
        let key = ParentKey {
            kind,
            id: id.to_string(),
        };
        let Some((_, children)) = self.pending.remove(&key) else {
            return;
        };
        self.pending_len.fetch_sub(children.len(), Ordering::Relaxed);
        StoreMetrics::add(&self.metrics.pending_resolved, children.len() as u64);
        for child in children {
            match child {
                PendingRelation::Outcome { outcome_id } => {
                    Self::append_unique(&self.market_outcomes, id, &outcome_id);
                }
                PendingRelation::Market { market_id } => {
                    Self::append_unique(&self.match_markets, id, &market_id);
                }
            }
        }
    }

    fn pend(&self, kind: ParentKind, parent_id: &str, relation: PendingRelation) {
        if self.pending_len.load(Ordering::Relaxed) >= self.pending_cap {
            StoreMetrics::inc(&self.metrics.pending_dropped);
            let dropped = self.metrics.pending_dropped.load(Ordering::Relaxed);
            if dropped <= 10 || dropped % 1000 == 0 {
                warn!(
                    dropped,
                    parent = parent_id,
                    "pending-relation buffer full, dropping orphan"
                );
            }
            return;
        }
        self.pending
            .entry(ParentKey {
                kind,
                id: parent_id.to_string(),
            })
            .or_default()
            .push(relation);
        self.pending_len.fetch_add(1, Ordering::Relaxed);
        StoreMetrics::inc(&self.metrics.pending_buffered);
    }

    pub fn pending_count(&self) -> usize {
        self.pending_len.load(Ordering::Relaxed)
    }

    // -- reference-data links (parent row not required for the index) --------

    pub fn link_tournament(&self, location_id: &str, tournament_id: &str) {
        Self::append_unique(&self.location_tournaments, location_id, tournament_id);
    }

    pub fn link_match_to_tournament(&self, tournament_id: &str, match_id: &str) {
        Self::append_unique(&self.tournament_matches, tournament_id, match_id);
    }

    pub fn set_offer_for_outcome(&self, outcome_id: &str, offer_id: &str) {
        self.offer_by_outcome
            .insert(outcome_id.to_string(), offer_id.to_string());
    }

    pub fn push_main_market(&self, sport_id: &str, betting_type_id: &str) {
        Self::append_unique(&self.main_market_order, sport_id, betting_type_id);
    }

    // -- reads ---------------------------------------------------------------

    pub fn outcomes_of(&self, market_id: &str) -> Vec<String> {
        self.market_outcomes
            .get(market_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn markets_of(&self, match_id: &str) -> Vec<String> {
        self.match_markets
            .get(match_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn tournaments_of(&self, location_id: &str) -> Vec<String> {
        self.location_tournaments
            .get(location_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn matches_of(&self, tournament_id: &str) -> Vec<String> {
        self.tournament_matches
            .get(tournament_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn offer_for_outcome(&self, outcome_id: &str) -> Option<String> {
        self.offer_by_outcome.get(outcome_id).map(|v| v.clone())
    }

    pub fn main_market_order(&self, sport_id: &str) -> Vec<String> {
        self.main_market_order
            .get(sport_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    // -- list membership -----------------------------------------------------

    /// Authoritative replacement on snapshot: membership becomes exactly the
    /// ids seen in this batch. Entities leaving the list stay in the tables.
    pub fn replace_list(&self, scope: &str, ids: Vec<String>) {
        self.list_members.insert(scope.to_string(), ids);
    }

    /// Delta merge: append new ids, never remove.
    pub fn merge_list(&self, scope: &str, ids: &[String]) {
        let mut entry = self.list_members.entry(scope.to_string()).or_default();
        for id in ids {
            if !entry.iter().any(|existing| existing == id) {
                entry.push(id.clone());
            }
        }
    }

    pub fn list(&self, scope: &str) -> Vec<String> {
        self.list_members
            .get(scope)
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}
