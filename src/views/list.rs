use std::cmp::Ordering;

use crate::store::OddsStore;
use crate::types::{MarketRow, MatchRow, OfferRow, OutcomeRow};

/// Denormalized read model for one listed match: the row plus its markets
/// and priced outcomes, assembled on demand from the tables and indices.
/// Views are plain values; holding one does not watch anything.
#[derive(Debug, Clone)]
pub struct MatchView {
    pub row: MatchRow,
    pub markets: Vec<MarketView>,
}

#[derive(Debug, Clone)]
pub struct MarketView {
    pub row: MarketRow,
    pub outcomes: Vec<OutcomeView>,
}

#[derive(Debug, Clone)]
pub struct OutcomeView {
    pub row: OutcomeRow,
    /// Current price, when a betting offer has arrived for this outcome.
    pub offer: Option<OfferRow>,
}

/// Assemble the list read model for a scope, at most `limit` matches.
///
/// Markets are ordered by the sport's main-market descriptors (feed arrival
/// order of the descriptors, unranked types last), outcomes by their line
/// parameter then code. Matches missing from the tables (membership known,
/// row still in flight) are skipped rather than surfaced half-empty.
pub fn list_view(store: &OddsStore, scope: &str, limit: usize) -> Vec<MatchView> {
    store
        .list_snapshot(scope)
        .into_iter()
        .take(limit)
        .filter_map(|match_id| {
            let row = store.get_match(&match_id)?;
            let markets = assemble_markets(store, &row);
            Some(MatchView { row, markets })
        })
        .collect()
}

fn assemble_markets(store: &OddsStore, match_row: &MatchRow) -> Vec<MarketView> {
    let ranking = store.indices.main_market_order(&match_row.sport_id);
    let rank_of = |betting_type_id: &str| {
        ranking
            .iter()
            .position(|t| t == betting_type_id)
            .unwrap_or(usize::MAX)
    };

    let mut markets: Vec<MarketView> = store
        .markets_of_match(&match_row.id)
        .into_iter()
        .filter_map(|market_id| {
            let row = store.get_market(&market_id)?;
            if row.is_closed {
                return None;
            }
            let outcomes = assemble_outcomes(store, &market_id);
            Some(MarketView { row, outcomes })
        })
        .collect();

    markets.sort_by(|a, b| {
        rank_of(&a.row.betting_type_id)
            .cmp(&rank_of(&b.row.betting_type_id))
            .then_with(|| a.row.name.cmp(&b.row.name))
    });
    markets
}

fn assemble_outcomes(store: &OddsStore, market_id: &str) -> Vec<OutcomeView> {
    let mut outcomes: Vec<OutcomeView> = store
        .outcomes_of_market(market_id)
        .into_iter()
        .filter_map(|outcome_id| {
            let row = store.get_outcome(&outcome_id)?;
            let offer = store.offer_for_outcome(&outcome_id);
            Some(OutcomeView { row, offer })
        })
        .collect();

    outcomes.sort_by(|a, b| {
        compare_lines(a.row.param_line, b.row.param_line)
            .then_with(|| a.row.code.cmp(&b.row.code))
    });
    outcomes
}

fn compare_lines(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::engine::ApplyMode;
    use crate::types::{MainMarketRow, MatchStatus};
    use crate::wire::{Envelope, TaggedRecord};

    const SCOPE: &str = "FBL:live:-";

    fn seed(store: &OddsStore) {
        let records = vec![
            TaggedRecord::MainMarket(MainMarketRow {
                id: "mm1".into(),
                sport_id: "FBL".into(),
                betting_type_id: "1X2".into(),
                betting_type_name: Some("Match Result".into()),
                live_market: true,
            }),
            TaggedRecord::MainMarket(MainMarketRow {
                id: "mm2".into(),
                sport_id: "FBL".into(),
                betting_type_id: "OU".into(),
                betting_type_name: Some("Total Goals".into()),
                live_market: true,
            }),
            TaggedRecord::Match(MatchRow {
                id: "m1".into(),
                sport_id: "FBL".into(),
                tournament_id: "t1".into(),
                tournament_name: None,
                venue_id: None,
                start_time: 0,
                status: MatchStatus::Live,
                home_participant_id: "h".into(),
                home_participant_name: "H".into(),
                away_participant_id: "a".into(),
                away_participant_name: "A".into(),
                home_score: None,
                away_score: None,
            }),
            // Feed order is OU first; the view must still rank 1X2 before it.
            TaggedRecord::Market(MarketRow {
                id: "mk-ou".into(),
                event_id: "m1".into(),
                betting_type_id: "OU".into(),
                name: "Total Goals".into(),
                is_available: true,
                is_closed: false,
                param_line: Some(2.5),
            }),
            TaggedRecord::Market(MarketRow {
                id: "mk-1x2".into(),
                event_id: "m1".into(),
                betting_type_id: "1X2".into(),
                name: "Match Result".into(),
                is_available: true,
                is_closed: false,
                param_line: None,
            }),
            TaggedRecord::Outcome(OutcomeRow {
                id: "o-over".into(),
                market_id: "mk-ou".into(),
                name: "Over 2.5".into(),
                short_name: None,
                code: "OVER".into(),
                param_line: Some(2.5),
            }),
            TaggedRecord::Outcome(OutcomeRow {
                id: "o-under".into(),
                market_id: "mk-ou".into(),
                name: "Under 2.5".into(),
                short_name: None,
                code: "UNDER".into(),
                param_line: Some(2.5),
            }),
            TaggedRecord::BettingOffer(OfferRow {
                id: "bo-over".into(),
                outcome_id: "o-over".into(),
                odds: 1.90,
                is_open: true,
                last_changed_time: 0,
            }),
        ];
        store.apply_envelope(
            SCOPE,
            &Envelope {
                version: None,
                message_type: None,
                records,
                malformed: 0,
            },
            ApplyMode::Snapshot,
        );
    }

    #[test]
    fn markets_ranked_by_main_market_order() {
        let store = OddsStore::new(64);
        seed(&store);

        let views = list_view(&store, SCOPE, 10);
        assert_eq!(views.len(), 1);
        let market_ids: Vec<&str> = views[0]
            .markets
            .iter()
            .map(|m| m.row.id.as_str())
            .collect();
        assert_eq!(market_ids, vec!["mk-1x2", "mk-ou"]);
    }

    #[test]
    fn outcomes_carry_offers_when_present() {
        let store = OddsStore::new(64);
        seed(&store);

        let views = list_view(&store, SCOPE, 10);
        let ou = views[0]
            .markets
            .iter()
            .find(|m| m.row.id == "mk-ou")
            .unwrap();
        // Equal lines, code breaks the tie.
        assert_eq!(ou.outcomes[0].row.code, "OVER");
        assert_eq!(ou.outcomes[0].offer.as_ref().unwrap().odds, 1.90);
        assert!(ou.outcomes[1].offer.is_none());
    }

    #[test]
    fn limit_pages_the_list() {
        let store = OddsStore::new(64);
        seed(&store);
        let views = list_view(&store, SCOPE, 0);
        assert!(views.is_empty());
    }

    #[test]
    fn membership_without_row_is_skipped() {
        let store = OddsStore::new(64);
        store.indices.replace_list(SCOPE, vec!["ghost".into()]);
        assert!(list_view(&store, SCOPE, 10).is_empty());
    }
}
