pub mod multiplexer;
pub mod transport;
pub mod ws;

pub use multiplexer::{Multiplexer, MultiplexerOptions, Subscription, SubscriptionHandle};
pub use transport::{FeedTransport, TopicConnection};
pub use ws::WsTransport;
