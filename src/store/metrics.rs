use std::sync::atomic::{AtomicU64, Ordering};

/// Store-wide instrumentation counters.
///
/// All counters are monotonic and relaxed — they exist for diagnostics and
/// for the observable guarantees the store makes (zero watchers ⇒ zero
/// fan-out work, bounded orphan buffer, one connection per topic).
#[derive(Debug, Default)]
pub struct StoreMetrics {
    pub records_applied: AtomicU64,
    /// Recognized tags with no table behind them (cashout, generic event).
    pub records_ignored: AtomicU64,
    /// Unknown or undecodable records skipped by the engine.
    pub records_unknown: AtomicU64,
    pub batches_snapshot: AtomicU64,
    pub batches_delta: AtomicU64,
    /// Entity commits published to a live watch channel.
    pub notifications_sent: AtomicU64,
    /// Entity commits with no watcher — no allocation, no send.
    pub notifications_skipped: AtomicU64,
    pub pending_buffered: AtomicU64,
    pub pending_resolved: AtomicU64,
    /// Orphans dropped because the pending buffer hit its cap.
    pub pending_dropped: AtomicU64,
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
}

/// Plain-value copy of the counters, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_applied: u64,
    pub records_ignored: u64,
    pub records_unknown: u64,
    pub batches_snapshot: u64,
    pub batches_delta: u64,
    pub notifications_sent: u64,
    pub notifications_skipped: u64,
    pub pending_buffered: u64,
    pub pending_resolved: u64,
    pub pending_dropped: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
}

impl StoreMetrics {
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_applied: self.records_applied.load(Ordering::Relaxed),
            records_ignored: self.records_ignored.load(Ordering::Relaxed),
            records_unknown: self.records_unknown.load(Ordering::Relaxed),
            batches_snapshot: self.batches_snapshot.load(Ordering::Relaxed),
            batches_delta: self.batches_delta.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_skipped: self.notifications_skipped.load(Ordering::Relaxed),
            pending_buffered: self.pending_buffered.load(Ordering::Relaxed),
            pending_resolved: self.pending_resolved.load(Ordering::Relaxed),
            pending_dropped: self.pending_dropped.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
        }
    }
}
