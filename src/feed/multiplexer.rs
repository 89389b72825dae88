use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{Config, EVENT_CHANNEL_CAPACITY};
use crate::error::FeedError;
use crate::feed::transport::FeedTransport;
use crate::store::engine::ApplyMode;
use crate::store::metrics::StoreMetrics;
use crate::store::OddsStore;
use crate::types::{BatchSummary, DisconnectReason, LifecycleEvent, Topic, TopicRequest};

// ---------------------------------------------------------------------------
// Topic bookkeeping
// ---------------------------------------------------------------------------

/// Forward progress of one topic's connection. Absent from the map means
/// idle. `Connected` sits between open and first frame: joiners in that
/// window get `Connected` replayed but wait for the real initial batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TopicPhase {
    Connecting,
    Connected,
    SnapshotReceived,
    Streaming,
}

struct Consumer {
    id: u64,
    tx: mpsc::Sender<LifecycleEvent>,
}

struct TopicEntry {
    phase: TopicPhase,
    /// Set when the last consumer leaves; a re-subscribe within the grace
    /// window clears it and the topic resumes in whatever phase it was in.
    closing: bool,
    consumers: Vec<Consumer>,
    /// Bumped on every consumer-count transition; a pending teardown only
    /// fires if the generation it captured is still current.
    generation: u64,
    /// Signals the driver task to stop on teardown.
    stop: Arc<Notify>,
    scope: String,
}

impl TopicEntry {
    fn broadcast(&self, event: &LifecycleEvent) {
        for consumer in &self.consumers {
            if let Err(e) = consumer.tx.try_send(event.clone()) {
                warn!(consumer = consumer.id, "event channel full, dropping: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Multiplexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MultiplexerOptions {
    pub operator_id: String,
    pub language: String,
    pub snapshot_timeout: Duration,
    pub close_grace: Duration,
}

impl MultiplexerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            operator_id: config.operator_id.clone(),
            language: config.language.clone(),
            snapshot_timeout: config.snapshot_timeout,
            close_grace: config.close_grace,
        }
    }
}

/// Shares one upstream connection per topic among any number of consumers.
///
/// The first subscriber to a topic opens the connection; later subscribers
/// attach to it. The last unsubscribe starts a grace timer instead of
/// tearing down immediately, so a quick re-subscribe (pagination, view
/// flips) reuses the live stream.
pub struct Multiplexer {
    transport: Arc<dyn FeedTransport>,
    store: Arc<OddsStore>,
    topics: Mutex<HashMap<String, TopicEntry>>,
    opts: MultiplexerOptions,
    next_consumer_id: AtomicU64,
}

/// One consumer's view of a topic: the lifecycle event stream plus the
/// handle that keeps the subscription alive.
pub struct Subscription {
    pub events: mpsc::Receiver<LifecycleEvent>,
    pub handle: SubscriptionHandle,
}

/// Dropping the handle unsubscribes. Idempotent.
pub struct SubscriptionHandle {
    mux: Arc<Multiplexer>,
    topic_key: String,
    consumer_id: u64,
    released: AtomicBool,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.mux.remove_consumer(&self.topic_key, self.consumer_id);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl Multiplexer {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        store: Arc<OddsStore>,
        opts: MultiplexerOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            store,
            topics: Mutex::new(HashMap::new()),
            opts,
            next_consumer_id: AtomicU64::new(1),
        })
    }

    pub fn store(&self) -> &Arc<OddsStore> {
        &self.store
    }

    /// Topics with a live or pending connection.
    pub fn active_topics(&self) -> usize {
        self.topics.lock().len()
    }

    /// Attach a consumer to `topic`, opening the upstream connection if this
    /// is the first one. Joining a topic that is already streaming replays
    /// `Connected` plus a synthetic `InitialContent` built from the current
    /// list membership, so late joiners never wait for the next delta.
    pub fn subscribe(self: &Arc<Self>, topic: &Topic) -> Subscription {
        let key = topic.key();
        let consumer_id = self.next_consumer_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let spawn_driver = {
            let mut topics = self.topics.lock();
            match topics.get_mut(&key) {
                Some(entry) => {
                    entry.generation += 1;
                    if entry.closing {
                        // Cancels the pending teardown; the connection was
                        // never closed and the phase is whatever the driver
                        // last reached.
                        entry.closing = false;
                        debug!(topic = %key, "re-subscribe cancelled pending close");
                    }
                    // Replay what this joiner missed. Before the connection
                    // is up there is nothing to replay; once streaming, the
                    // initial batch is synthesized from current membership.
                    // In between (Connected, SnapshotReceived) the driver's
                    // own InitialContent broadcast is still ahead of us.
                    if entry.phase >= TopicPhase::Connected {
                        let _ = tx.try_send(LifecycleEvent::Connected);
                    }
                    if entry.phase == TopicPhase::Streaming {
                        let summary = Arc::new(BatchSummary {
                            match_ids: self.store.list_snapshot(&entry.scope),
                            records_applied: 0,
                            records_skipped: 0,
                        });
                        let _ = tx.try_send(LifecycleEvent::InitialContent(summary));
                    }
                    entry.consumers.push(Consumer {
                        id: consumer_id,
                        tx,
                    });
                    None
                }
                None => {
                    let stop = Arc::new(Notify::new());
                    topics.insert(
                        key.clone(),
                        TopicEntry {
                            phase: TopicPhase::Connecting,
                            closing: false,
                            consumers: vec![Consumer {
                                id: consumer_id,
                                tx,
                            }],
                            generation: 0,
                            stop: Arc::clone(&stop),
                            scope: topic.scope(),
                        },
                    );
                    Some(stop)
                }
            }
        };

        if let Some(stop) = spawn_driver {
            let mux = Arc::clone(self);
            let topic = topic.clone();
            tokio::spawn(async move {
                mux.drive_topic(topic, stop).await;
            });
        }

        Subscription {
            events: rx,
            handle: SubscriptionHandle {
                mux: Arc::clone(self),
                topic_key: key,
                consumer_id,
                released: AtomicBool::new(false),
            },
        }
    }

    fn remove_consumer(self: &Arc<Self>, topic_key: &str, consumer_id: u64) {
        let teardown = {
            let mut topics = self.topics.lock();
            let Some(entry) = topics.get_mut(topic_key) else {
                return;
            };
            let Some(pos) = entry.consumers.iter().position(|c| c.id == consumer_id) else {
                return;
            };
            let consumer = entry.consumers.remove(pos);
            let _ = consumer
                .tx
                .try_send(LifecycleEvent::Disconnected(DisconnectReason::Unsubscribed));

            entry.generation += 1;
            if entry.consumers.is_empty() && !entry.closing {
                entry.closing = true;
                Some(entry.generation)
            } else {
                None
            }
        };

        let Some(generation) = teardown else { return };
        let mux = Arc::clone(self);
        let key = topic_key.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(mux.opts.close_grace).await;
                    mux.finish_teardown(&key, generation);
                });
            }
            // No runtime (process teardown): close immediately.
            Err(_) => self.finish_teardown(&key, generation),
        }
    }

    fn finish_teardown(&self, topic_key: &str, generation: u64) {
        let mut topics = self.topics.lock();
        let Some(entry) = topics.get(topic_key) else {
            return;
        };
        if !entry.closing || entry.generation != generation || !entry.consumers.is_empty() {
            // Someone re-subscribed during the grace window.
            return;
        }
        if let Some(entry) = topics.remove(topic_key) {
            entry.stop.notify_waiters();
            info!(topic = %topic_key, "topic idle, connection released");
        }
    }

    // -- driver --------------------------------------------------------------

    async fn drive_topic(self: Arc<Self>, topic: Topic, stop: Arc<Notify>) {
        let key = topic.key();
        let request = TopicRequest::new(&self.opts.operator_id, &self.opts.language, &topic);

        let opened = tokio::select! {
            opened = timeout(self.opts.snapshot_timeout, self.transport.open(&request)) => opened,
            _ = stop.notified() => return,
        };
        let mut conn = match opened {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!(topic = %key, "topic connect failed: {e}");
                self.fail_topic(&key, DisconnectReason::Transport(e.to_string()));
                return;
            }
            Err(_) => {
                warn!(topic = %key, "topic connect timed out");
                self.fail_topic(&key, DisconnectReason::SnapshotTimeout);
                return;
            }
        };
        StoreMetrics::inc(&self.store.metrics().connections_opened);
        self.advance(&key, TopicPhase::Connected, Some(LifecycleEvent::Connected));

        // Initial snapshot, bounded by the configured timeout. A topic must
        // never hang silently in Connecting.
        let first = tokio::select! {
            first = timeout(self.opts.snapshot_timeout, conn.frames.recv()) => first,
            _ = stop.notified() => {
                StoreMetrics::inc(&self.store.metrics().connections_closed);
                return;
            }
        };
        let envelope = match first {
            Ok(Some(Ok(envelope))) => envelope,
            Ok(Some(Err(e))) => {
                self.close_with(&key, DisconnectReason::Transport(e.to_string()));
                return;
            }
            Ok(None) => {
                self.close_with(&key, DisconnectReason::Closed);
                return;
            }
            Err(_) => {
                let err = FeedError::SnapshotTimeout { topic: key.clone() };
                warn!("{err}");
                self.close_with(&key, DisconnectReason::SnapshotTimeout);
                return;
            }
        };

        self.advance(&key, TopicPhase::SnapshotReceived, None);
        let summary = self
            .store
            .apply_envelope_arc(&topic.scope(), &envelope, ApplyMode::Snapshot);
        info!(
            topic = %key,
            matches = summary.match_ids.len(),
            applied = summary.records_applied,
            "initial content applied"
        );
        // Phase flip and broadcast happen under one lock: a joiner either
        // sees SnapshotReceived and is in the broadcast, or sees Streaming
        // and gets the synthetic replay — never both, never neither.
        self.advance(
            &key,
            TopicPhase::Streaming,
            Some(LifecycleEvent::InitialContent(summary)),
        );

        loop {
            let next = tokio::select! {
                next = conn.frames.recv() => next,
                _ = stop.notified() => {
                    StoreMetrics::inc(&self.store.metrics().connections_closed);
                    return;
                }
            };
            match next {
                Some(Ok(envelope)) => {
                    let summary = self.store.apply_envelope_arc(
                        &topic.scope(),
                        &envelope,
                        ApplyMode::Delta,
                    );
                    debug!(
                        topic = %key,
                        applied = summary.records_applied,
                        skipped = summary.records_skipped,
                        "delta applied"
                    );
                    self.broadcast(&key, &LifecycleEvent::UpdatedContent(summary));
                }
                Some(Err(e)) => {
                    self.close_with(&key, DisconnectReason::Transport(e.to_string()));
                    return;
                }
                None => {
                    self.close_with(&key, DisconnectReason::Closed);
                    return;
                }
            }
        }
    }

    fn advance(&self, topic_key: &str, phase: TopicPhase, event: Option<LifecycleEvent>) {
        let mut topics = self.topics.lock();
        if let Some(entry) = topics.get_mut(topic_key) {
            entry.phase = phase;
            if let Some(event) = event {
                entry.broadcast(&event);
            }
        }
    }

    fn broadcast(&self, topic_key: &str, event: &LifecycleEvent) {
        let topics = self.topics.lock();
        if let Some(entry) = topics.get(topic_key) {
            entry.broadcast(event);
        }
    }

    /// Connection died after it was opened: notify consumers and drop the
    /// topic so the next subscribe reconnects from scratch.
    fn close_with(&self, topic_key: &str, reason: DisconnectReason) {
        StoreMetrics::inc(&self.store.metrics().connections_closed);
        self.fail_topic(topic_key, reason);
    }

    fn fail_topic(&self, topic_key: &str, reason: DisconnectReason) {
        let entry = self.topics.lock().remove(topic_key);
        if let Some(entry) = entry {
            entry.broadcast(&LifecycleEvent::Disconnected(reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::feed::transport::TopicConnection;
    use crate::types::{ListKind, MatchRow, MatchStatus};
    use crate::wire::{Envelope, TaggedRecord};
    use async_trait::async_trait;

    /// Test transport: every open yields a channel the test feeds by hand.
    struct ScriptedTransport {
        opens: AtomicU64,
        senders: Mutex<Vec<mpsc::Sender<Result<Envelope>>>>,
        open_delay: Duration,
    }

    impl ScriptedTransport {
        fn new() -> Arc<Self> {
            Self::with_open_delay(Duration::ZERO)
        }

        /// Simulates a slow upstream handshake.
        fn with_open_delay(open_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                opens: AtomicU64::new(0),
                senders: Mutex::new(Vec::new()),
                open_delay,
            })
        }

        fn opens(&self) -> u64 {
            self.opens.load(Ordering::SeqCst)
        }

        /// Waits for the driver to open before pushing the frame, since
        /// subscribe spawns the connection asynchronously.
        async fn feed(&self, envelope: Envelope) {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
            let tx = loop {
                if let Some(tx) = self.senders.lock().last().cloned() {
                    break tx;
                }
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "no connection opened to feed"
                );
                tokio::time::sleep(Duration::from_millis(2)).await;
            };
            tx.send(Ok(envelope)).await.expect("driver hung up");
        }
    }

    #[async_trait]
    impl FeedTransport for ScriptedTransport {
        async fn open(&self, _request: &TopicRequest) -> Result<TopicConnection> {
            if self.open_delay > Duration::ZERO {
                tokio::time::sleep(self.open_delay).await;
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().push(tx);
            Ok(TopicConnection { frames: rx })
        }
    }

    fn mux_with(
        transport: Arc<ScriptedTransport>,
        snapshot_timeout: Duration,
        close_grace: Duration,
    ) -> Arc<Multiplexer> {
        Multiplexer::new(
            transport,
            Arc::new(OddsStore::new(64)),
            MultiplexerOptions {
                operator_id: "op-1".into(),
                language: "en".into(),
                snapshot_timeout,
                close_grace,
            },
        )
    }

    fn match_env(ids: &[&str]) -> Envelope {
        Envelope {
            version: None,
            message_type: None,
            records: ids
                .iter()
                .map(|id| {
                    TaggedRecord::Match(MatchRow {
                        id: id.to_string(),
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
                    })
                })
                .collect(),
            malformed: 0,
        }
    }

    async fn expect_event(events: &mut mpsc::Receiver<LifecycleEvent>) -> LifecycleEvent {
        timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream ended")
    }

    #[tokio::test]
    async fn snapshot_then_delta_lifecycle() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        let mut sub = mux.subscribe(&Topic::new("FBL", ListKind::Live, 20));

        assert!(matches!(expect_event(&mut sub.events).await, LifecycleEvent::Connected));
        transport.feed(match_env(&["m1", "m2"])).await;
        match expect_event(&mut sub.events).await {
            LifecycleEvent::InitialContent(summary) => {
                assert_eq!(summary.match_ids, vec!["m1", "m2"]);
            }
            other => panic!("expected InitialContent, got {other:?}"),
        }

        transport.feed(match_env(&["m3"])).await;
        match expect_event(&mut sub.events).await {
            LifecycleEvent::UpdatedContent(summary) => {
                assert_eq!(summary.match_ids, vec!["m3"]);
            }
            other => panic!("expected UpdatedContent, got {other:?}"),
        }
        assert_eq!(
            mux.store().list_snapshot("FBL:live:-"),
            vec!["m1", "m2", "m3"]
        );
    }

    #[tokio::test]
    async fn two_consumers_share_one_connection() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        let topic = Topic::new("FBL", ListKind::Live, 20);

        let mut sub_a = mux.subscribe(&topic);
        let mut sub_b = mux.subscribe(&topic);
        transport.feed(match_env(&["m1"])).await;

        for sub in [&mut sub_a, &mut sub_b] {
            assert!(matches!(expect_event(&mut sub.events).await, LifecycleEvent::Connected));
            assert!(matches!(
                expect_event(&mut sub.events).await,
                LifecycleEvent::InitialContent(_)
            ));
        }
        assert_eq!(transport.opens(), 1);
        assert_eq!(mux.active_topics(), 1);

        // First consumer leaves, the shared connection stays up.
        drop(sub_a);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(mux.active_topics(), 1);

        // Second consumer leaves, the connection goes with it.
        drop(sub_b);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(mux.active_topics(), 0);
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn late_joiner_gets_synthetic_initial_content() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        let topic = Topic::new("FBL", ListKind::Live, 20);

        let mut first = mux.subscribe(&topic);
        transport.feed(match_env(&["m1", "m2"])).await;
        assert!(matches!(expect_event(&mut first.events).await, LifecycleEvent::Connected));
        assert!(matches!(
            expect_event(&mut first.events).await,
            LifecycleEvent::InitialContent(_)
        ));

        let mut late = mux.subscribe(&topic);
        assert!(matches!(expect_event(&mut late.events).await, LifecycleEvent::Connected));
        match expect_event(&mut late.events).await {
            LifecycleEvent::InitialContent(summary) => {
                assert_eq!(summary.match_ids, vec!["m1", "m2"]);
                assert_eq!(summary.records_applied, 0);
            }
            other => panic!("expected InitialContent, got {other:?}"),
        }
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn snapshot_timeout_surfaces_disconnect() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_millis(20),
            Duration::from_millis(10),
        );
        let mut sub = mux.subscribe(&Topic::new("FBL", ListKind::Live, 20));

        assert!(matches!(expect_event(&mut sub.events).await, LifecycleEvent::Connected));
        // No frame ever arrives.
        match expect_event(&mut sub.events).await {
            LifecycleEvent::Disconnected(DisconnectReason::SnapshotTimeout) => {}
            other => panic!("expected SnapshotTimeout, got {other:?}"),
        }
        assert_eq!(mux.active_topics(), 0);
    }

    #[tokio::test]
    async fn server_close_surfaces_disconnect() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        let mut sub = mux.subscribe(&Topic::new("FBL", ListKind::Live, 20));
        assert!(matches!(expect_event(&mut sub.events).await, LifecycleEvent::Connected));
        transport.feed(match_env(&["m1"])).await;
        assert!(matches!(
            expect_event(&mut sub.events).await,
            LifecycleEvent::InitialContent(_)
        ));

        transport.senders.lock().clear(); // server hangs up
        match expect_event(&mut sub.events).await {
            LifecycleEvent::Disconnected(DisconnectReason::Closed) => {}
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn last_unsubscribe_tears_down_after_grace() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(20),
        );
        let topic = Topic::new("FBL", ListKind::Live, 20);
        let mut sub = mux.subscribe(&topic);
        assert!(matches!(expect_event(&mut sub.events).await, LifecycleEvent::Connected));
        transport.feed(match_env(&["m1"])).await;
        assert!(matches!(
            expect_event(&mut sub.events).await,
            LifecycleEvent::InitialContent(_)
        ));

        sub.handle.unsubscribe();
        match expect_event(&mut sub.events).await {
            LifecycleEvent::Disconnected(DisconnectReason::Unsubscribed) => {}
            other => panic!("expected Unsubscribed, got {other:?}"),
        }
        assert_eq!(mux.active_topics(), 1); // grace window still open
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(mux.active_topics(), 0);
    }

    #[tokio::test]
    async fn resubscribe_within_grace_keeps_connection() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(50),
        );
        let topic = Topic::new("FBL", ListKind::Live, 20);

        let mut sub = mux.subscribe(&topic);
        assert!(matches!(expect_event(&mut sub.events).await, LifecycleEvent::Connected));
        transport.feed(match_env(&["m1"])).await;
        assert!(matches!(
            expect_event(&mut sub.events).await,
            LifecycleEvent::InitialContent(_)
        ));

        drop(sub); // starts the grace timer
        let mut again = mux.subscribe(&topic);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.opens(), 1);
        assert_eq!(mux.active_topics(), 1);
        assert!(matches!(expect_event(&mut again.events).await, LifecycleEvent::Connected));
    }

    #[tokio::test]
    async fn resubscribe_while_still_connecting_does_not_fabricate_events() {
        // Slow handshake: the first consumer leaves before open() finishes,
        // and a second one joins within the grace window. It must not see a
        // premature Connected or an empty initial batch.
        let transport = ScriptedTransport::with_open_delay(Duration::from_millis(40));
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(200),
        );
        let topic = Topic::new("FBL", ListKind::Live, 20);

        let sub = mux.subscribe(&topic);
        drop(sub); // handshake still in flight
        let mut again = mux.subscribe(&topic);

        assert!(matches!(expect_event(&mut again.events).await, LifecycleEvent::Connected));
        transport.feed(match_env(&["m1"])).await;
        match expect_event(&mut again.events).await {
            LifecycleEvent::InitialContent(summary) => {
                assert_eq!(summary.match_ids, vec!["m1"]);
                assert_eq!(summary.records_applied, 1);
            }
            other => panic!("expected InitialContent, got {other:?}"),
        }
        assert!(again.events.try_recv().is_err());
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn joiner_between_connect_and_snapshot_gets_connected_once() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        let topic = Topic::new("FBL", ListKind::Live, 20);

        let mut first = mux.subscribe(&topic);
        // The connection is up but no frame has arrived yet.
        assert!(matches!(expect_event(&mut first.events).await, LifecycleEvent::Connected));

        let mut joiner = mux.subscribe(&topic);
        assert!(matches!(expect_event(&mut joiner.events).await, LifecycleEvent::Connected));

        transport.feed(match_env(&["m1"])).await;

        for sub in [&mut first, &mut joiner] {
            match expect_event(&mut sub.events).await {
                LifecycleEvent::InitialContent(summary) => {
                    assert_eq!(summary.match_ids, vec!["m1"]);
                }
                other => panic!("expected InitialContent, got {other:?}"),
            }
            assert!(sub.events.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn different_page_sizes_use_separate_connections() {
        let transport = ScriptedTransport::new();
        let mux = mux_with(
            Arc::clone(&transport),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        let _small = mux.subscribe(&Topic::new("FBL", ListKind::Live, 20));
        let _large = mux.subscribe(&Topic::new("FBL", ListKind::Live, 40));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(transport.opens(), 2);
        assert_eq!(mux.active_topics(), 2);
    }
}
