use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// Per-entity value channels, created lazily on the first watch and removed
/// when the last watcher is dropped. Publishing to an unwatched id is a
/// single map lookup and no allocation.
#[derive(Debug)]
pub struct WatchRegistry<T: Clone> {
    slots: Arc<DashMap<String, Slot<T>>>,
}

#[derive(Debug)]
struct Slot<T> {
    tx: watch::Sender<Option<T>>,
    watchers: Arc<AtomicUsize>,
}

impl<T: Clone> Default for WatchRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> WatchRegistry<T> {
    /// Open a watch on `id`, seeded with the entity's current table value
    /// (or None if it has not arrived yet).
    ///
    /// The seed closure runs while the slot is created, under the map entry
    /// lock for `id`. A publish on the same id cannot interleave between the
    /// seed read and the channel registration, so the first watcher never
    /// observes a value older than the last committed one.
    pub fn watch(&self, id: &str, seed: impl FnOnce() -> Option<T>) -> EntityWatch<T> {
        let slot = self.slots.entry(id.to_string()).or_insert_with(|| {
            let (tx, _) = watch::channel(seed());
            Slot {
                tx,
                watchers: Arc::new(AtomicUsize::new(0)),
            }
        });
        slot.watchers.fetch_add(1, Ordering::SeqCst);
        let rx = slot.tx.subscribe();
        EntityWatch {
            rx,
            _guard: WatchGuard {
                slots: Arc::clone(&self.slots),
                id: id.to_string(),
                watchers: Arc::clone(&slot.watchers),
            },
        }
    }

    /// Push a new value to whoever is watching `id`. Returns true when a
    /// channel existed (a notification was actually delivered).
    pub fn publish(&self, id: &str, value: T) -> bool {
        match self.slots.get(id) {
            Some(slot) => {
                slot.tx.send_replace(Some(value));
                true
            }
            None => false,
        }
    }

    pub fn is_watched(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn watched_count(&self) -> usize {
        self.slots.len()
    }
}

/// Handle held by a consumer. Dropping it releases the channel; the slot is
/// removed once no watchers remain.
#[derive(Debug)]
pub struct EntityWatch<T> {
    rx: watch::Receiver<Option<T>>,
    _guard: WatchGuard<T>,
}

impl<T: Clone> EntityWatch<T> {
    pub fn current(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published value. Returns None if the registry
    /// itself was dropped.
    pub async fn changed(&mut self) -> Option<Option<T>> {
        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow_and_update().clone()),
            Err(_) => None,
        }
    }
}

#[derive(Debug)]
struct WatchGuard<T> {
    slots: Arc<DashMap<String, Slot<T>>>,
    id: String,
    watchers: Arc<AtomicUsize>,
}

impl<T> Drop for WatchGuard<T> {
    fn drop(&mut self) {
        if self.watchers.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Last watcher gone. Re-check under the map entry in case a new
            // watch raced in between the decrement and the removal.
            self.slots
                .remove_if(&self.id, |_, slot| slot.watchers.load(Ordering::SeqCst) == 0);
        }
    }
}
