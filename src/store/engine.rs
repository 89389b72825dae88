use std::sync::Arc;

use tracing::debug;

use crate::store::indices::ParentKind;
use crate::store::metrics::StoreMetrics;
use crate::store::OddsStore;
use crate::types::BatchSummary;
use crate::wire::{Envelope, TaggedRecord};

/// How a decoded batch rewrites list membership. Entity upserts are the same
/// either way; only the list step differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Initial content: list membership becomes exactly the matches seen.
    Snapshot,
    /// Incremental update: new matches join the list, nothing leaves it.
    Delta,
}

impl OddsStore {
    /// Route every record of a decoded batch into the tables, maintain the
    /// relationship indices as a side effect of each upsert, and publish to
    /// any open per-entity channels. One pass, no global lock.
    pub fn apply_envelope(&self, scope: &str, envelope: &Envelope, mode: ApplyMode) -> BatchSummary {
        let mut match_ids: Vec<String> = Vec::new();
        let mut applied = 0usize;
        let mut skipped = 0usize;

        for record in &envelope.records {
            match record {
                TaggedRecord::Match(row) => {
                    let row = row.clone();
                    if !match_ids.iter().any(|id| id == &row.id) {
                        match_ids.push(row.id.clone());
                    }
                    self.indices
                        .link_match_to_tournament(&row.tournament_id, &row.id);
                    self.tables.put_match(row.clone());
                    // Markets that arrived before this match can land now.
                    self.indices.resolve_parent(ParentKind::Match, &row.id);
                    self.publish_match(row);
                    applied += 1;
                }
                TaggedRecord::Market(row) => {
                    let row = row.clone();
                    self.indices.link_market(
                        &row.event_id,
                        &row.id,
                        self.tables.has_match(&row.event_id),
                    );
                    self.tables.put_market(row.clone());
                    self.indices.resolve_parent(ParentKind::Market, &row.id);
                    self.publish_market(row);
                    applied += 1;
                }
                TaggedRecord::Outcome(row) => {
                    let row = row.clone();
                    self.indices.link_outcome(
                        &row.market_id,
                        &row.id,
                        self.tables.has_market(&row.market_id),
                    );
                    self.tables.put_outcome(row.clone());
                    self.publish_outcome(row);
                    applied += 1;
                }
                TaggedRecord::BettingOffer(row) => {
                    let row = row.clone();
                    self.indices.set_offer_for_outcome(&row.outcome_id, &row.id);
                    self.tables.put_offer(row.clone());
                    self.publish_offer(row);
                    applied += 1;
                }
                TaggedRecord::Tournament(row) => {
                    self.indices.link_tournament(&row.location_id, &row.id);
                    self.tables.put_tournament(row.clone());
                    applied += 1;
                }
                TaggedRecord::Location(row) => {
                    self.tables.put_location(row.clone());
                    applied += 1;
                }
                TaggedRecord::MainMarket(row) => {
                    self.indices
                        .push_main_market(&row.sport_id, &row.betting_type_id);
                    self.tables.put_main_market(row.clone());
                    applied += 1;
                }
                TaggedRecord::MarketOutcomeRelation(rel) => {
                    self.indices.link_outcome(
                        &rel.market_id,
                        &rel.outcome_id,
                        self.tables.has_market(&rel.market_id),
                    );
                    applied += 1;
                }
                TaggedRecord::Banner(row) => {
                    self.tables.put_banner(row.clone());
                    applied += 1;
                }
                TaggedRecord::EventPartScore(score) => {
                    match self.tables.update_match_score(
                        &score.event_id,
                        score.home_score,
                        score.away_score,
                    ) {
                        Some(updated) => {
                            self.publish_match(updated);
                            applied += 1;
                        }
                        // Score for a match we never stored; nothing to fold.
                        None => skipped += 1,
                    }
                }
                TaggedRecord::Cashout { .. } | TaggedRecord::Event { .. } => {
                    StoreMetrics::inc(&self.metrics().records_ignored);
                    skipped += 1;
                }
                TaggedRecord::Unknown { kind } => {
                    debug!(kind, "skipping unrecognized record kind");
                    StoreMetrics::inc(&self.metrics().records_unknown);
                    skipped += 1;
                }
            }
        }

        match mode {
            ApplyMode::Snapshot => {
                self.indices.replace_list(scope, match_ids.clone());
                StoreMetrics::inc(&self.metrics().batches_snapshot);
            }
            ApplyMode::Delta => {
                self.indices.merge_list(scope, &match_ids);
                StoreMetrics::inc(&self.metrics().batches_delta);
            }
        }
        StoreMetrics::add(&self.metrics().records_applied, applied as u64);

        BatchSummary {
            match_ids,
            records_applied: applied,
            records_skipped: skipped,
        }
    }

    pub fn apply_envelope_arc(
        &self,
        scope: &str,
        envelope: &Envelope,
        mode: ApplyMode,
    ) -> Arc<BatchSummary> {
        Arc::new(self.apply_envelope(scope, envelope, mode))
    }
}
