use std::collections::VecDeque;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::state::{diff, ChangedKeys, SharedState};

/// Callback invoked with each newly published snapshot
pub type StateSubscriber = Box<dyn FnMut(&SharedState, &ChangedKeys) + Send>;

/// Holds the currently published shared-state snapshot.
///
/// Hosts publish whole snapshots; subscribers are notified with the new
/// snapshot and the keys that changed relative to the one it replaced.
///
/// Callbacks run without any lock held, so a subscriber may publish or
/// subscribe itself. Snapshots published during a notification are queued
/// and delivered in publish order once the current round has finished.
pub struct StateStore {
    current: RwLock<SharedState>,
    subscribers: Mutex<Vec<StateSubscriber>>,
    outbox: Mutex<Outbox>,
}

#[derive(Default)]
struct Outbox {
    pending: VecDeque<(SharedState, ChangedKeys)>,
    delivering: bool,
}

impl StateStore {
    pub fn new(initial: SharedState) -> Self {
        Self {
            current: RwLock::new(initial),
            subscribers: Mutex::new(Vec::new()),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// The snapshot currently published
    pub fn current(&self) -> SharedState {
        self.current.read().clone()
    }

    /// Replace the published snapshot and notify subscribers
    pub fn publish(&self, next: SharedState) -> ChangedKeys {
        let changed = {
            let mut current = self.current.write();
            let changed = diff(&current, &next);
            *current = next.clone();
            changed
        };
        if changed.is_empty() {
            return changed;
        }
        debug!(changed = ?changed.sorted(), "published shared state");

        {
            let mut outbox = self.outbox.lock();
            outbox.pending.push_back((next, changed.clone()));
            if outbox.delivering {
                return changed;
            }
            outbox.delivering = true;
        }
        self.deliver();
        changed
    }

    fn deliver(&self) {
        loop {
            let (state, changed) = {
                let mut outbox = self.outbox.lock();
                match outbox.pending.pop_front() {
                    Some(entry) => entry,
                    None => {
                        outbox.delivering = false;
                        return;
                    }
                }
            };
            let mut subscribers = std::mem::take(&mut *self.subscribers.lock());
            for subscriber in subscribers.iter_mut() {
                subscriber(&state, &changed);
            }
            let mut slot = self.subscribers.lock();
            subscribers.append(&mut slot);
            *slot = subscribers;
        }
    }

    /// Derive the next snapshot from the current one and publish it
    pub fn update<F>(&self, f: F) -> ChangedKeys
    where
        F: FnOnce(&SharedState) -> SharedState,
    {
        let next = f(&self.current());
        self.publish(next)
    }

    pub fn subscribe(&self, subscriber: StateSubscriber) {
        self.subscribers.lock().push(subscriber);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(SharedState::default())
    }
}
