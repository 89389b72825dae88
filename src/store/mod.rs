pub mod engine;
pub mod fanout;
pub mod indices;
pub mod metrics;
pub mod tables;

use std::sync::Arc;

use crate::types::{
    LocationRow, MarketRow, MatchRow, OfferRow, OutcomeRow, TournamentRow,
};
use fanout::{EntityWatch, WatchRegistry};
use indices::RelationIndices;
use metrics::{MetricsSnapshot, StoreMetrics};
use tables::EntityTables;

/// Shared, concurrently-updated odds store: normalized entity tables,
/// incrementally-maintained relationship indices, and per-entity watch
/// channels for change fan-out.
///
/// Writes come from the feed driver applying decoded batches; reads and
/// watches come from any number of consumer tasks. All maps are sharded,
/// no global lock.
#[derive(Debug)]
pub struct OddsStore {
    pub(crate) tables: EntityTables,
    pub(crate) indices: RelationIndices,
    match_channels: WatchRegistry<MatchRow>,
    market_channels: WatchRegistry<MarketRow>,
    outcome_channels: WatchRegistry<OutcomeRow>,
    offer_channels: WatchRegistry<OfferRow>,
    metrics: Arc<StoreMetrics>,
}

impl OddsStore {
    pub fn new(pending_relation_cap: usize) -> Self {
        let metrics = Arc::new(StoreMetrics::default());
        Self {
            tables: EntityTables::default(),
            indices: RelationIndices::new(pending_relation_cap, Arc::clone(&metrics)),
            match_channels: WatchRegistry::default(),
            market_channels: WatchRegistry::default(),
            outcome_channels: WatchRegistry::default(),
            offer_channels: WatchRegistry::default(),
            metrics,
        }
    }

    // -- point reads ---------------------------------------------------------

    pub fn get_match(&self, id: &str) -> Option<MatchRow> {
        self.tables.match_row(id)
    }

    pub fn get_market(&self, id: &str) -> Option<MarketRow> {
        self.tables.market(id)
    }

    pub fn get_outcome(&self, id: &str) -> Option<OutcomeRow> {
        self.tables.outcome(id)
    }

    pub fn get_offer(&self, id: &str) -> Option<OfferRow> {
        self.tables.offer(id)
    }

    pub fn get_tournament(&self, id: &str) -> Option<TournamentRow> {
        self.tables.tournament(id)
    }

    pub fn get_location(&self, id: &str) -> Option<LocationRow> {
        self.tables.location(id)
    }

    // -- relationship reads --------------------------------------------------

    pub fn markets_of_match(&self, match_id: &str) -> Vec<String> {
        self.indices.markets_of(match_id)
    }

    pub fn outcomes_of_market(&self, market_id: &str) -> Vec<String> {
        self.indices.outcomes_of(market_id)
    }

    pub fn offer_for_outcome(&self, outcome_id: &str) -> Option<OfferRow> {
        self.indices
            .offer_for_outcome(outcome_id)
            .and_then(|id| self.tables.offer(&id))
    }

    pub fn tournaments_of_location(&self, location_id: &str) -> Vec<String> {
        self.indices.tournaments_of(location_id)
    }

    pub fn matches_of_tournament(&self, tournament_id: &str) -> Vec<String> {
        self.indices.matches_of(tournament_id)
    }

    /// Ordered match-id membership for a list scope ("sport:list:filter").
    pub fn list_snapshot(&self, scope: &str) -> Vec<String> {
        self.indices.list(scope)
    }

    // -- watches -------------------------------------------------------------

    pub fn watch_match(&self, id: &str) -> EntityWatch<MatchRow> {
        self.match_channels.watch(id, || self.tables.match_row(id))
    }

    pub fn watch_market(&self, id: &str) -> EntityWatch<MarketRow> {
        self.market_channels.watch(id, || self.tables.market(id))
    }

    pub fn watch_outcome(&self, id: &str) -> EntityWatch<OutcomeRow> {
        self.outcome_channels.watch(id, || self.tables.outcome(id))
    }

    pub fn watch_offer(&self, id: &str) -> EntityWatch<OfferRow> {
        self.offer_channels.watch(id, || self.tables.offer(id))
    }

    // -- publish helpers for the apply engine --------------------------------

    pub(crate) fn publish_match(&self, row: MatchRow) {
        let id = row.id.clone();
        self.count_publish(self.match_channels.publish(&id, row));
    }

    pub(crate) fn publish_market(&self, row: MarketRow) {
        let id = row.id.clone();
        self.count_publish(self.market_channels.publish(&id, row));
    }

    pub(crate) fn publish_outcome(&self, row: OutcomeRow) {
        let id = row.id.clone();
        self.count_publish(self.outcome_channels.publish(&id, row));
    }

    pub(crate) fn publish_offer(&self, row: OfferRow) {
        let id = row.id.clone();
        self.count_publish(self.offer_channels.publish(&id, row));
    }

    fn count_publish(&self, delivered: bool) {
        if delivered {
            StoreMetrics::inc(&self.metrics.notifications_sent);
        } else {
            StoreMetrics::inc(&self.metrics.notifications_skipped);
        }
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
