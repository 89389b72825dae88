use dashmap::DashMap;

use crate::types::{
    BannerRow, LocationRow, MainMarketRow, MarketRow, MatchRow, OfferRow, OutcomeRow,
    TournamentRow,
};

/// Plain keyed storage, one concurrent map per entity kind.
///
/// One map per kind keeps writer serialization per shard while readers stay
/// concurrent. No behavior beyond get/put/delete lives here — relationships
/// are the indices' job, routing is the engine's.
#[derive(Debug, Default)]
pub struct EntityTables {
    matches: DashMap<String, MatchRow>,
    markets: DashMap<String, MarketRow>,
    outcomes: DashMap<String, OutcomeRow>,
    offers: DashMap<String, OfferRow>,
    tournaments: DashMap<String, TournamentRow>,
    locations: DashMap<String, LocationRow>,
    main_markets: DashMap<String, MainMarketRow>,
    banners: DashMap<String, BannerRow>,
}

impl EntityTables {
    pub fn new() -> Self {
        Self::default()
    }

    // -- match ---------------------------------------------------------------

    pub fn put_match(&self, row: MatchRow) {
        self.matches.insert(row.id.clone(), row);
    }

    pub fn match_row(&self, id: &str) -> Option<MatchRow> {
        self.matches.get(id).map(|r| r.clone())
    }

    pub fn has_match(&self, id: &str) -> bool {
        self.matches.contains_key(id)
    }

    pub fn delete_match(&self, id: &str) {
        self.matches.remove(id);
    }

    /// Fold a live score fragment into an existing match row. Returns the
    /// updated row, or None when the match has not arrived yet.
    pub fn update_match_score(
        &self,
        id: &str,
        home: Option<u32>,
        away: Option<u32>,
    ) -> Option<MatchRow> {
        let mut entry = self.matches.get_mut(id)?;
        if home.is_some() {
            entry.home_score = home;
        }
        if away.is_some() {
            entry.away_score = away;
        }
        Some(entry.clone())
    }

    // -- market --------------------------------------------------------------

    pub fn put_market(&self, row: MarketRow) {
        self.markets.insert(row.id.clone(), row);
    }

    pub fn market(&self, id: &str) -> Option<MarketRow> {
        self.markets.get(id).map(|r| r.clone())
    }

    pub fn has_market(&self, id: &str) -> bool {
        self.markets.contains_key(id)
    }

    pub fn delete_market(&self, id: &str) {
        self.markets.remove(id);
    }

    // -- outcome -------------------------------------------------------------

    pub fn put_outcome(&self, row: OutcomeRow) {
        self.outcomes.insert(row.id.clone(), row);
    }

    pub fn outcome(&self, id: &str) -> Option<OutcomeRow> {
        self.outcomes.get(id).map(|r| r.clone())
    }

    pub fn has_outcome(&self, id: &str) -> bool {
        self.outcomes.contains_key(id)
    }

    pub fn delete_outcome(&self, id: &str) {
        self.outcomes.remove(id);
    }

    // -- betting offer -------------------------------------------------------

    pub fn put_offer(&self, row: OfferRow) {
        self.offers.insert(row.id.clone(), row);
    }

    pub fn offer(&self, id: &str) -> Option<OfferRow> {
        self.offers.get(id).map(|r| r.clone())
    }

    pub fn delete_offer(&self, id: &str) {
        self.offers.remove(id);
    }

    // -- reference data ------------------------------------------------------

    pub fn put_tournament(&self, row: TournamentRow) {
        self.tournaments.insert(row.id.clone(), row);
    }

    pub fn tournament(&self, id: &str) -> Option<TournamentRow> {
        self.tournaments.get(id).map(|r| r.clone())
    }

    pub fn put_location(&self, row: LocationRow) {
        self.locations.insert(row.id.clone(), row);
    }

    pub fn location(&self, id: &str) -> Option<LocationRow> {
        self.locations.get(id).map(|r| r.clone())
    }

    pub fn put_main_market(&self, row: MainMarketRow) {
        self.main_markets.insert(row.id.clone(), row);
    }

    pub fn main_market(&self, id: &str) -> Option<MainMarketRow> {
        self.main_markets.get(id).map(|r| r.clone())
    }

    pub fn put_banner(&self, row: BannerRow) {
        self.banners.insert(row.id.clone(), row);
    }

    pub fn banner(&self, id: &str) -> Option<BannerRow> {
        self.banners.get(id).map(|r| r.clone())
    }

    // -- counts (diagnostics) ------------------------------------------------

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchStatus;

    fn match_row(id: &str) -> MatchRow {
        MatchRow {
            id: id.to_string(),
            sport_id: "FBL".to_string(),
            tournament_id: "t1".to_string(),
            tournament_name: None,
            venue_id: None,
            start_time: 0,
            status: MatchStatus::NotStarted,
            home_participant_id: "h".to_string(),
            home_participant_name: "Home".to_string(),
            away_participant_id: "a".to_string(),
            away_participant_name: "Away".to_string(),
            home_score: None,
            away_score: None,
        }
    }

    #[test]
    fn put_overwrites_by_id() {
        let tables = EntityTables::new();
        tables.put_match(match_row("m1"));
        let mut updated = match_row("m1");
        updated.status = MatchStatus::Live;
        tables.put_match(updated);
        assert_eq!(tables.match_count(), 1);
        assert_eq!(tables.match_row("m1").unwrap().status, MatchStatus::Live);
    }

    #[test]
    fn score_update_requires_existing_match() {
        let tables = EntityTables::new();
        assert!(tables.update_match_score("m1", Some(1), None).is_none());
        tables.put_match(match_row("m1"));
        let row = tables.update_match_score("m1", Some(1), Some(0)).unwrap();
        assert_eq!(row.home_score, Some(1));
        assert_eq!(row.away_score, Some(0));
    }

    #[test]
    fn partial_score_keeps_other_side() {
        let tables = EntityTables::new();
        tables.put_match(match_row("m1"));
        tables.update_match_score("m1", Some(1), Some(2));
        let row = tables.update_match_score("m1", None, Some(3)).unwrap();
        assert_eq!(row.home_score, Some(1));
        assert_eq!(row.away_score, Some(3));
    }
}
