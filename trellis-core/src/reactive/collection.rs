//! Observed keyed collections: sets and maps.
//!
//! Both collections key their entries by the same-value projection
//! ([`Value::key`]), so NaN is one set member and container keys match by
//! store identity. Membership reads track per-entry; size and iteration track
//! the structural key, which adds and removals invalidate but in-place value
//! updates do not, except for map iteration, where the values are visible
//! and an in-place update therefore re-runs iterating computations too.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::warn;

use super::tracker::{ChangeKind, DepKey, TargetId, Tracker};
use super::value::{Mode, Value, ValueKey};
use crate::error::Error;

struct SetStore {
    id: TargetId,
    tracker: Arc<Tracker>,
    items: RwLock<IndexMap<ValueKey, Value>>,
}

/// An observed set with same-value membership.
#[derive(Clone)]
pub struct ReactiveSet {
    store: Arc<SetStore>,
    mode: Mode,
}

impl ReactiveSet {
    pub fn new(tracker: &Arc<Tracker>) -> Self {
        Self::with_items(tracker, std::iter::empty::<Value>())
    }

    /// Create an observed set with initial members; nothing is triggered.
    pub fn with_items(tracker: &Arc<Tracker>, items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            store: Arc::new(SetStore {
                id: TargetId::next(),
                tracker: tracker.clone(),
                items: RwLock::new(
                    items
                        .into_iter()
                        .map(|v| {
                            let v = v.normalized();
                            (v.key(), v)
                        })
                        .collect(),
                ),
            }),
            mode: Mode::Deep,
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.store.id
    }

    pub fn ptr_eq(&self, other: &ReactiveSet) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn with_mode(&self, mode: Mode) -> Self {
        Self {
            store: self.store.clone(),
            mode,
        }
    }

    pub fn readonly(&self) -> Self {
        self.with_mode(Mode::ReadOnly)
    }

    pub fn shallow(&self) -> Self {
        self.with_mode(Mode::Shallow)
    }

    pub fn raw(&self) -> Self {
        self.with_mode(Mode::Raw)
    }

    /// Number of members, subscribing the running computation to structure.
    pub fn size(&self) -> usize {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        self.store.items.read().len()
    }

    /// Membership test, subscribing to this entry alone.
    pub fn has(&self, value: &Value) -> bool {
        let key = value.key();
        if self.mode.tracks() {
            self.store
                .tracker
                .track(self.store.id, DepKey::Entry(key.clone()));
        }
        self.store.items.read().contains_key(&key)
    }

    /// Insert a member. Adding a value already present is a no-op.
    pub fn add(&self, value: impl Into<Value>) {
        if let Err(error) = self.try_add(value) {
            warn!(%error, "ignored mutation");
        }
    }

    pub fn try_add(&self, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into().normalized();
        let key = value.key();
        if !self.mode.writable() {
            return Err(Error::ReadOnly {
                key: key.display(),
            });
        }
        let inserted = {
            let mut items = self.store.items.write();
            items.insert(key.clone(), value).is_none()
        };
        if inserted && self.mode.triggers() {
            self.store
                .tracker
                .trigger(self.store.id, &DepKey::Entry(key), ChangeKind::Add, None);
        }
        Ok(())
    }

    /// Remove a member; removing an absent value is a no-op.
    pub fn remove(&self, value: &Value) -> bool {
        let key = value.key();
        if !self.mode.writable() {
            warn!(key = %key.display(), "ignored removal through read-only handle");
            return false;
        }
        let removed = self.store.items.write().shift_remove(&key).is_some();
        if removed && self.mode.triggers() {
            self.store
                .tracker
                .trigger(self.store.id, &DepKey::Entry(key), ChangeKind::Remove, None);
        }
        removed
    }

    /// Snapshot of every member, subscribing to structure.
    pub fn to_vec(&self) -> Vec<Value> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        let child = self.mode.child();
        self.store
            .items
            .read()
            .values()
            .map(|v| v.with_mode(child))
            .collect()
    }
}

struct MapStore {
    id: TargetId,
    tracker: Arc<Tracker>,
    // Entries keep the original key value alongside the mapped value so
    // iteration can yield it back.
    entries: RwLock<IndexMap<ValueKey, (Value, Value)>>,
}

/// An observed map keyed by same-value semantics.
#[derive(Clone)]
pub struct ReactiveMap {
    store: Arc<MapStore>,
    mode: Mode,
}

impl ReactiveMap {
    pub fn new(tracker: &Arc<Tracker>) -> Self {
        Self::with_entries(tracker, std::iter::empty::<(Value, Value)>())
    }

    /// Create an observed map with initial entries; nothing is triggered.
    pub fn with_entries(
        tracker: &Arc<Tracker>,
        entries: impl IntoIterator<Item = (Value, Value)>,
    ) -> Self {
        Self {
            store: Arc::new(MapStore {
                id: TargetId::next(),
                tracker: tracker.clone(),
                entries: RwLock::new(
                    entries
                        .into_iter()
                        .map(|(k, v)| {
                            let k = k.normalized();
                            (k.key(), (k, v.normalized()))
                        })
                        .collect(),
                ),
            }),
            mode: Mode::Deep,
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.store.id
    }

    pub fn ptr_eq(&self, other: &ReactiveMap) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn with_mode(&self, mode: Mode) -> Self {
        Self {
            store: self.store.clone(),
            mode,
        }
    }

    pub fn readonly(&self) -> Self {
        self.with_mode(Mode::ReadOnly)
    }

    pub fn shallow(&self) -> Self {
        self.with_mode(Mode::Shallow)
    }

    pub fn raw(&self) -> Self {
        self.with_mode(Mode::Raw)
    }

    /// Read the value under `key`; [`Value::Null`] when absent.
    pub fn get(&self, key: &Value) -> Value {
        let k = key.key();
        if self.mode.tracks() {
            self.store
                .tracker
                .track(self.store.id, DepKey::Entry(k.clone()));
        }
        let value = self
            .store
            .entries
            .read()
            .get(&k)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null);
        value.with_mode(self.mode.child())
    }

    /// Whether `key` is present, subscribing to this entry alone.
    pub fn has(&self, key: &Value) -> bool {
        let k = key.key();
        if self.mode.tracks() {
            self.store
                .tracker
                .track(self.store.id, DepKey::Entry(k.clone()));
        }
        self.store.entries.read().contains_key(&k)
    }

    /// Write one entry.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) {
        if let Err(error) = self.try_set(key, value) {
            warn!(%error, "ignored mutation");
        }
    }

    /// Write one entry, or report [`Error::ReadOnly`].
    ///
    /// Replacing an existing value re-runs both the entry's subscribers and
    /// iterating computations; writing the same value re-runs nothing.
    pub fn try_set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<(), Error> {
        let key = key.into().normalized();
        let k = key.key();
        if !self.mode.writable() {
            return Err(Error::ReadOnly { key: k.display() });
        }
        let value = value.into().normalized();
        enum Outcome {
            Added,
            Replaced,
            Unchanged,
        }
        let outcome = {
            let mut entries = self.store.entries.write();
            match entries.get_mut(&k) {
                Some((_, existing)) => {
                    if existing.same_value(&value) {
                        Outcome::Unchanged
                    } else {
                        *existing = value;
                        Outcome::Replaced
                    }
                }
                None => {
                    entries.insert(k.clone(), (key, value));
                    Outcome::Added
                }
            }
        };
        if self.mode.triggers() {
            match outcome {
                Outcome::Added => {
                    self.store
                        .tracker
                        .trigger(self.store.id, &DepKey::Entry(k), ChangeKind::Add, None);
                }
                Outcome::Replaced => {
                    // Iteration over a map sees values, so a value replacement
                    // must reach iterating computations as well.
                    self.store.tracker.trigger_many(
                        self.store.id,
                        &[DepKey::Entry(k), DepKey::Iterate],
                    );
                }
                Outcome::Unchanged => {}
            }
        }
        Ok(())
    }

    /// Remove one entry, returning whether it existed.
    pub fn remove(&self, key: &Value) -> bool {
        let k = key.key();
        if !self.mode.writable() {
            warn!(key = %k.display(), "ignored removal through read-only handle");
            return false;
        }
        let removed = self.store.entries.write().shift_remove(&k).is_some();
        if removed && self.mode.triggers() {
            self.store
                .tracker
                .trigger(self.store.id, &DepKey::Entry(k), ChangeKind::Remove, None);
        }
        removed
    }

    /// Number of entries, subscribing the running computation to structure.
    pub fn size(&self) -> usize {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        self.store.entries.read().len()
    }

    /// Snapshot of the keys, subscribing to structure.
    pub fn keys(&self) -> Vec<Value> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        let child = self.mode.child();
        self.store
            .entries
            .read()
            .values()
            .map(|(k, _)| k.with_mode(child))
            .collect()
    }

    /// Snapshot of every (key, value) pair, subscribing to structure.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        let child = self.mode.child();
        self.store
            .entries
            .read()
            .values()
            .map(|(k, v)| (k.with_mode(child), v.with_mode(child)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::Effect;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn set_membership_tracks_single_entry() {
        let tracker = Tracker::new();
        let set = ReactiveSet::new(&tracker);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let set_clone = set.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = set_clone.has(&Value::from(1));
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        set.add(2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        set.add(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn redundant_add_does_not_trigger() {
        let tracker = Tracker::new();
        let set = ReactiveSet::with_items(&tracker, [Value::from(1)]);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let set_clone = set.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = set_clone.size();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        set.add(1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nan_is_one_set_member() {
        let tracker = Tracker::new();
        let set = ReactiveSet::new(&tracker);

        set.add(f64::NAN);
        set.add(-f64::NAN);

        assert_eq!(set.raw().size(), 1);
        assert!(set.has(&Value::from(f64::NAN)));
    }

    #[test]
    fn map_value_replacement_reaches_iterators() {
        let tracker = Tracker::new();
        let map = ReactiveMap::with_entries(&tracker, [(Value::from("a"), Value::from(1))]);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let map_clone = map.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = map_clone.entries();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        map.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Same-value write stays silent.
        map.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn map_get_tracks_its_key_only() {
        let tracker = Tracker::new();
        let map = ReactiveMap::new(&tracker);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let map_clone = map.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = map_clone.get(&Value::from("a"));
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        map.set("b", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        map.set("a", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn readonly_map_ignores_writes() {
        let tracker = Tracker::new();
        let map = ReactiveMap::new(&tracker);
        let frozen = map.readonly();

        frozen.set("a", 1);
        assert!(matches!(
            frozen.try_set("a", 1),
            Err(Error::ReadOnly { .. })
        ));
        assert_eq!(map.raw().size(), 0);
    }

    #[test]
    fn container_keys_match_by_identity() {
        let tracker = Tracker::new();
        let map = ReactiveMap::new(&tracker);
        let key = crate::reactive::record::ReactiveRecord::new(&tracker);

        map.set(Value::Record(key.clone()), 7);

        let via_readonly = map.get(&Value::Record(key.readonly()));
        assert_eq!(via_readonly.as_number(), Some(7.0));
    }
}
