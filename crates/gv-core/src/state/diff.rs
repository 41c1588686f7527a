use ahash::AHashSet;
use tracing::trace;

use super::SharedState;

/// Top-level keys whose values differ between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedKeys(AHashSet<String>);

impl ChangedKeys {
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Whether any of `keys` changed
    pub fn any_of(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.contains(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Keys in lexical order, for stable logging and assertions
    pub fn sorted(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.iter().collect();
        keys.sort_unstable();
        keys
    }
}

impl<K: Into<String>> FromIterator<K> for ChangedKeys {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Shallow dirty-check between two snapshots.
///
/// A key is reported when it was removed, added, or its value is not
/// [`StateValue::is_same`](super::StateValue::is_same) as before. Nested
/// structures are never compared, so a freshly allocated but equal object
/// still counts as a change.
pub fn diff(old: &SharedState, new: &SharedState) -> ChangedKeys {
    let mut changed = AHashSet::new();
    for (key, old_value) in old.iter() {
        match new.get(key) {
            Some(new_value) if old_value.is_same(new_value) => {}
            _ => {
                changed.insert(key.to_string());
            }
        }
    }
    for key in new.keys() {
        if !old.contains_key(key) {
            changed.insert(key.to_string());
        }
    }
    let changed = ChangedKeys(changed);
    trace!(changed = ?changed.sorted(), "shared state diff");
    changed
}

/// Remembers the snapshot a consumer last reacted to.
///
/// [`StateTracker::observe`] diffs against the remembered snapshot and
/// replaces it in the same step, so no update can slip between the diff and
/// the snapshot.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    previous: Option<SharedState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `next` against the previous snapshot and remember `next`.
    ///
    /// The first observation reports every key of `next`.
    pub fn observe(&mut self, next: &SharedState) -> ChangedKeys {
        let changed = match &self.previous {
            Some(previous) => diff(previous, next),
            None => diff(&SharedState::default(), next),
        };
        self.previous = Some(next.clone());
        changed
    }

    pub fn previous(&self) -> Option<&SharedState> {
        self.previous.as_ref()
    }

    /// Forget the previous snapshot so the next observation reports everything
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Go back to `previous`, as returned by [`StateTracker::previous`]
    /// before the last observation
    pub fn rewind(&mut self, previous: Option<SharedState>) {
        self.previous = previous;
    }
}
