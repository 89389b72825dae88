pub mod list;

pub use list::{list_view, MarketView, MatchView, OutcomeView};
