//! Live odds aggregation store.
//!
//! Decodes polymorphic record batches from an upstream sportsbook feed into
//! normalized entity tables, maintains the relationship indices between
//! them incrementally, and fans out changes through per-entity watch
//! channels. Consumers subscribe to logical topics (sport + list + filter);
//! the multiplexer shares one upstream connection per topic among them.

pub mod config;
pub mod error;
pub mod feed;
pub mod store;
pub mod types;
pub mod views;
pub mod wire;

pub use error::{FeedError, Result};
pub use feed::{Multiplexer, MultiplexerOptions, Subscription, WsTransport};
pub use store::OddsStore;
pub use types::{DisconnectReason, LifecycleEvent, ListKind, Topic};
