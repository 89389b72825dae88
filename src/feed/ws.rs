use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::{FRAME_CHANNEL_CAPACITY, WS_PING_INTERVAL_SECS};
use crate::error::{FeedError, Result};
use crate::feed::transport::{FeedTransport, TopicConnection};
use crate::types::TopicRequest;
use crate::wire::parse_envelope;

/// WebSocket transport: one socket per topic. The subscription request is
/// sent as the first frame; every text frame after that is a batch envelope.
pub struct WsTransport {
    ws_url: String,
    /// Total frames received across all sockets (flow diagnostics).
    frames_received: Arc<AtomicU64>,
}

impl WsTransport {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            frames_received: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn open(&self, request: &TopicRequest) -> Result<TopicConnection> {
        let (ws_stream, _) = connect_async(&self.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::to_string(request)?;
        write.send(Message::Text(subscribe.into())).await?;
        info!(
            sport = %request.sport_id,
            list = %request.list_kind,
            "WS topic opened on {}",
            self.ws_url
        );

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let frames_received = Arc::clone(&self.frames_received);

        tokio::spawn(async move {
            let mut ping_interval = interval(Duration::from_secs(WS_PING_INTERVAL_SECS));
            ping_interval.tick().await; // consume immediate first tick

            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let total = frames_received.fetch_add(1, Ordering::Relaxed) + 1;
                                if total % 500 == 0 {
                                    debug!(frames = total, "WS frame count");
                                }
                                let item = parse_envelope(&text);
                                if tx.send(item).await.is_err() {
                                    // Driver hung up; closing the socket is
                                    // the teardown.
                                    return;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if write.send(Message::Pong(data)).await.is_err() {
                                    return;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("WS topic stream closed by server");
                                return;
                            }
                            Some(Err(e)) => {
                                warn!("WS topic stream error: {e}");
                                let _ = tx.send(Err(FeedError::from(e))).await;
                                return;
                            }
                            Some(Ok(_)) => {}
                        }
                    }

                    _ = ping_interval.tick() => {
                        if write.send(Message::Ping(vec![].into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(TopicConnection { frames: rx })
    }
}
