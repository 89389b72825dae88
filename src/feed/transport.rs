use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::TopicRequest;
use crate::wire::Envelope;

/// One open upstream stream for one topic. Decoded envelopes arrive on
/// `frames`; an `Err` item is a transport failure, after which the sender
/// side hangs up. Dropping the receiver closes the underlying stream.
pub struct TopicConnection {
    pub frames: mpsc::Receiver<Result<Envelope>>,
}

/// Seam between the topic drivers and the wire. The production
/// implementation speaks WebSocket; tests script frames by hand.
#[async_trait]
pub trait FeedTransport: Send + Sync + 'static {
    async fn open(&self, request: &TopicRequest) -> Result<TopicConnection>;
}
