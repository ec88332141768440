//! Observed records (keyed structures) and the explicit observable cell.
//!
//! A [`ReactiveRecord`] is the observed-container counterpart of a plain
//! keyed object: field reads subscribe the running computation, field writes
//! notify it. The handle is a cheap clone over a shared store; derived views
//! ([`ReactiveRecord::readonly`] and friends) share the same store under a
//! different access mode.
//!
//! [`Ref`] wraps a single mutable cell as a one-field record under the
//! `value` key, letting primitive values participate in the same tracking
//! protocol as structures.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::warn;

use super::tracker::{ChangeKind, DepKey, TargetId, Tracker};
use super::value::{Mode, Value};
use crate::error::Error;

struct RecordStore {
    id: TargetId,
    tracker: Arc<Tracker>,
    entries: RwLock<IndexMap<Arc<str>, Value>>,
}

/// An observed keyed structure.
#[derive(Clone)]
pub struct ReactiveRecord {
    store: Arc<RecordStore>,
    mode: Mode,
}

impl ReactiveRecord {
    /// Create an empty observed record.
    pub fn new(tracker: &Arc<Tracker>) -> Self {
        Self::with_entries(tracker, std::iter::empty::<(&str, Value)>())
    }

    /// Create an observed record with initial entries; nothing is triggered.
    pub fn with_entries<'a>(
        tracker: &Arc<Tracker>,
        entries: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (Arc::<str>::from(k), v.normalized()))
            .collect();
        Self {
            store: Arc::new(RecordStore {
                id: TargetId::next(),
                tracker: tracker.clone(),
                entries: RwLock::new(entries),
            }),
            mode: Mode::Deep,
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.store.id
    }

    /// Whether two handles view the same underlying store.
    pub fn ptr_eq(&self, other: &ReactiveRecord) -> bool {
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

    /// Deep read-only view over the same store.
    pub fn readonly(&self) -> Self {
        self.with_mode(Mode::ReadOnly)
    }

    /// Shallow view: top-level reads track, nested containers come back raw.
    pub fn shallow(&self) -> Self {
        self.with_mode(Mode::Shallow)
    }

    /// Shallow read-only view.
    pub fn shallow_readonly(&self) -> Self {
        self.with_mode(Mode::ShallowReadOnly)
    }

    /// Raw view: the escape hatch past all tracking and triggering.
    pub fn raw(&self) -> Self {
        self.with_mode(Mode::Raw)
    }

    /// Read one field. Missing fields read as [`Value::Null`].
    pub fn get(&self, key: &str) -> Value {
        if self.mode.tracks() {
            self.store
                .tracker
                .track(self.store.id, DepKey::Field(Arc::from(key)));
        }
        let value = self
            .store
            .entries
            .read()
            .get(key)
            .cloned()
            .unwrap_or(Value::Null);
        value.with_mode(self.mode.child())
    }

    /// Write one field, notifying subscribers when the value genuinely
    /// changed. Writes through read-only handles are ignored with a warning.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        if let Err(error) = self.try_set(key, value) {
            warn!(%error, "ignored mutation");
        }
    }

    /// Write one field, or report [`Error::ReadOnly`].
    pub fn try_set(&self, key: &str, value: impl Into<Value>) -> Result<(), Error> {
        if !self.mode.writable() {
            return Err(Error::ReadOnly {
                key: key.to_string(),
            });
        }
        let value = value.into().normalized();
        let (kind, changed) = {
            let mut entries = self.store.entries.write();
            match entries.get(key) {
                Some(old) => {
                    let changed = !old.same_value(&value);
                    entries.insert(Arc::from(key), value);
                    (ChangeKind::Set, changed)
                }
                None => {
                    entries.insert(Arc::from(key), value);
                    (ChangeKind::Add, true)
                }
            }
        };
        if changed && self.mode.triggers() {
            self.store
                .tracker
                .trigger(self.store.id, &DepKey::Field(Arc::from(key)), kind, None);
        }
        Ok(())
    }

    /// Whether the field exists. Presence only changes on add/remove, so this
    /// subscribes to the structural key.
    pub fn has(&self, key: &str) -> bool {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        self.store.entries.read().contains_key(key)
    }

    /// Remove one field. Subscribers are notified only when the field
    /// existed; read-only handles ignore the call.
    pub fn remove(&self, key: &str) -> Option<Value> {
        if !self.mode.writable() {
            warn!(key, "ignored removal through read-only handle");
            return None;
        }
        let removed = self.store.entries.write().shift_remove(key);
        if removed.is_some() && self.mode.triggers() {
            self.store.tracker.trigger(
                self.store.id,
                &DepKey::Field(Arc::from(key)),
                ChangeKind::Remove,
                None,
            );
        }
        removed
    }

    /// Snapshot of the field names, subscribing to enumeration.
    pub fn keys(&self) -> Vec<Arc<str>> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        self.store.entries.read().keys().cloned().collect()
    }

    /// Snapshot of all entries, subscribing to enumeration and to every
    /// field read.
    pub fn entries(&self) -> Vec<(Arc<str>, Value)> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        let snapshot: Vec<(Arc<str>, Value)> = self
            .store
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        snapshot
            .into_iter()
            .map(|(k, v)| {
                if self.mode.tracks() {
                    self.store
                        .tracker
                        .track(self.store.id, DepKey::Field(k.clone()));
                }
                (k, v.with_mode(self.mode.child()))
            })
            .collect()
    }

    /// Number of fields, subscribing to enumeration.
    pub fn len(&self) -> usize {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Iterate);
        }
        self.store.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single observed cell: a one-field record under the `value` key.
#[derive(Clone)]
pub struct Ref {
    cell: ReactiveRecord,
}

impl Ref {
    /// Wrap `initial` as an observed cell.
    pub fn new(tracker: &Arc<Tracker>, initial: impl Into<Value>) -> Self {
        Self {
            cell: ReactiveRecord::with_entries(tracker, [("value", initial.into())]),
        }
    }

    /// Read the cell, subscribing the running computation.
    pub fn get(&self) -> Value {
        self.cell.get("value")
    }

    /// Replace the cell's value, notifying subscribers on genuine change.
    pub fn set(&self, value: impl Into<Value>) {
        self.cell.set("value", value);
    }

    /// The backing one-field record.
    pub fn as_record(&self) -> &ReactiveRecord {
        &self.cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::Effect;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn get_set_roundtrip() {
        let tracker = Tracker::new();
        let record = ReactiveRecord::new(&tracker);

        record.set("name", "trellis");
        assert_eq!(record.get("name").as_text(), Some("trellis"));
        assert!(record.get("missing").is_null());
    }

    #[test]
    fn write_triggers_reader() {
        let tracker = Tracker::new();
        let record = ReactiveRecord::with_entries(&tracker, [("count", Value::from(0))]);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let record_clone = record.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = record_clone.get("count");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        record.set("count", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Unrelated field: no re-run.
        record.set("other", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_value_write_does_not_trigger() {
        let tracker = Tracker::new();
        let record = ReactiveRecord::with_entries(&tracker, [("x", Value::Number(f64::NAN))]);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let record_clone = record.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = record_clone.get("x");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        record.set("x", f64::NAN);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        record.set("x", 1.0);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn enumeration_invalidated_by_add_not_set() {
        let tracker = Tracker::new();
        let record = ReactiveRecord::with_entries(&tracker, [("a", Value::from(1))]);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let record_clone = record.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = record_clone.keys();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        record.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1, "in-place set left keys alone");

        record.set("b", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2, "new key re-ran enumerator");

        record.remove("b");
        assert_eq!(runs.load(Ordering::SeqCst), 3, "removal re-ran enumerator");
    }

    #[test]
    fn readonly_writes_are_ignored() {
        let tracker = Tracker::new();
        let record = ReactiveRecord::with_entries(&tracker, [("x", Value::from(1))]);
        let frozen = record.readonly();
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let record_clone = record.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = record_clone.get("x");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        frozen.set("x", 99);
        assert_eq!(record.get("x").as_number(), Some(1.0));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(matches!(
            frozen.try_set("x", 99),
            Err(Error::ReadOnly { .. })
        ));
    }

    #[test]
    fn nested_reads_inherit_readonly() {
        let tracker = Tracker::new();
        let child = ReactiveRecord::with_entries(&tracker, [("n", Value::from(1))]);
        let parent =
            ReactiveRecord::with_entries(&tracker, [("child", Value::Record(child.clone()))]);

        let frozen = parent.readonly();
        let Value::Record(nested) = frozen.get("child") else {
            panic!("expected record");
        };
        nested.set("n", 2);
        assert_eq!(child.get("n").as_number(), Some(1.0));
    }

    #[test]
    fn shallow_reads_return_raw_children() {
        let tracker = Tracker::new();
        let child = ReactiveRecord::with_entries(&tracker, [("n", Value::from(1))]);
        let parent =
            ReactiveRecord::with_entries(&tracker, [("child", Value::Record(child.clone()))]);

        let shallow = parent.shallow();
        let Value::Record(nested) = shallow.get("child") else {
            panic!("expected record");
        };
        assert_eq!(nested.mode(), Mode::Raw);

        // Writes through the raw child mutate without notifying.
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let child_clone = child.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = child_clone.get("n");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        nested.set("n", 5);
        assert_eq!(child.get("n").as_number(), Some(5.0));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ref_participates_in_tracking() {
        let tracker = Tracker::new();
        let flag = Ref::new(&tracker, true);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let flag_clone = flag.clone();
        let _effect = Effect::new(&tracker, move || {
            let _ = flag_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        flag.set(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Same value again: no trigger.
        flag.set(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
