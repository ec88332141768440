//! Observed ordered sequences.
//!
//! Lists track at three granularities: one index, the length, and (through
//! the length) iteration. The index/length coupling follows the sequence
//! rules of the dependency store:
//!
//! - writing past the end is an add and re-runs length subscribers;
//! - shrinking the length re-runs subscribers of every truncated index;
//! - the mutating stack methods (push/pop/shift/unshift/splice) run with
//!   dependency capture paused, so a computation that merely appends does not
//!   subscribe itself to the length it implicitly touches. Two computations
//!   appending to the same list would otherwise re-trigger each other without
//!   bound.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::context::PauseTracking;
use super::tracker::{ChangeKind, DepKey, TargetId, Tracker};
use super::value::{Mode, Value};
use crate::error::Error;

struct ListStore {
    id: TargetId,
    tracker: Arc<Tracker>,
    items: RwLock<Vec<Value>>,
}

/// An observed ordered sequence.
#[derive(Clone)]
pub struct ReactiveList {
    store: Arc<ListStore>,
    mode: Mode,
}

impl ReactiveList {
    /// Create an empty observed list.
    pub fn new(tracker: &Arc<Tracker>) -> Self {
        Self::with_items(tracker, std::iter::empty::<Value>())
    }

    /// Create an observed list with initial items; nothing is triggered.
    pub fn with_items(tracker: &Arc<Tracker>, items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            store: Arc::new(ListStore {
                id: TargetId::next(),
                tracker: tracker.clone(),
                items: RwLock::new(items.into_iter().map(|v| v.normalized()).collect()),
            }),
            mode: Mode::Deep,
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.store.id
    }

    pub fn ptr_eq(&self, other: &ReactiveList) -> bool {
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

    /// Read one index. Out-of-range reads yield [`Value::Null`].
    pub fn get(&self, index: usize) -> Value {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Index(index));
        }
        let value = self
            .store
            .items
            .read()
            .get(index)
            .cloned()
            .unwrap_or(Value::Null);
        value.with_mode(self.mode.child())
    }

    /// Length of the sequence, subscribing the running computation to it.
    pub fn len(&self) -> usize {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Length);
        }
        self.store.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write one index. Writing at or past the current length extends the
    /// sequence (null-padding any gap) and counts as an add.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        if let Err(error) = self.try_set(index, value) {
            warn!(%error, "ignored mutation");
        }
    }

    /// Write one index, or report [`Error::ReadOnly`].
    pub fn try_set(&self, index: usize, value: impl Into<Value>) -> Result<(), Error> {
        if !self.mode.writable() {
            return Err(Error::ReadOnly {
                key: index.to_string(),
            });
        }
        let value = value.into().normalized();
        enum Outcome {
            InPlace { changed: bool },
            Extended { new_len: usize },
        }
        let outcome = {
            let mut items = self.store.items.write();
            if index < items.len() {
                let changed = !items[index].same_value(&value);
                items[index] = value;
                Outcome::InPlace { changed }
            } else {
                items.resize_with(index, || Value::Null);
                items.push(value);
                Outcome::Extended {
                    new_len: index + 1,
                }
            }
        };
        if self.mode.triggers() {
            match outcome {
                Outcome::InPlace { changed: true } => {
                    self.store
                        .tracker
                        .trigger(self.store.id, &DepKey::Index(index), ChangeKind::Set, None);
                }
                Outcome::InPlace { changed: false } => {}
                Outcome::Extended { new_len } => {
                    self.store.tracker.trigger(
                        self.store.id,
                        &DepKey::Index(index),
                        ChangeKind::Add,
                        Some(new_len),
                    );
                }
            }
        }
        Ok(())
    }

    /// Resize the sequence. Shrinking invalidates every truncated index.
    pub fn set_len(&self, new_len: usize) {
        if !self.mode.writable() {
            warn!(new_len, "ignored length write through read-only handle");
            return;
        }
        let old_len = {
            let mut items = self.store.items.write();
            let old_len = items.len();
            items.resize_with(new_len, || Value::Null);
            old_len
        };
        if old_len != new_len && self.mode.triggers() {
            self.store.tracker.trigger(
                self.store.id,
                &DepKey::Length,
                ChangeKind::Set,
                Some(new_len),
            );
        }
    }

    /// Append one value.
    pub fn push(&self, value: impl Into<Value>) {
        if !self.mode.writable() {
            warn!("ignored push through read-only handle");
            return;
        }
        let _pause = PauseTracking::new();
        let (index, new_len) = {
            let mut items = self.store.items.write();
            items.push(value.into().normalized());
            (items.len() - 1, items.len())
        };
        if self.mode.triggers() {
            self.store.tracker.trigger(
                self.store.id,
                &DepKey::Index(index),
                ChangeKind::Add,
                Some(new_len),
            );
        }
    }

    /// Remove and return the last value.
    pub fn pop(&self) -> Option<Value> {
        if !self.mode.writable() {
            warn!("ignored pop through read-only handle");
            return None;
        }
        let _pause = PauseTracking::new();
        let (popped, new_len) = {
            let mut items = self.store.items.write();
            let popped = items.pop();
            (popped, items.len())
        };
        if popped.is_some() && self.mode.triggers() {
            self.store.tracker.trigger(
                self.store.id,
                &DepKey::Length,
                ChangeKind::Set,
                Some(new_len),
            );
        }
        popped
    }

    /// Prepend one value; every existing index shifts.
    pub fn unshift(&self, value: impl Into<Value>) {
        self.splice(0, 0, [value.into()]);
    }

    /// Remove and return the first value; every remaining index shifts.
    pub fn shift(&self) -> Option<Value> {
        self.splice(0, 1, []).into_iter().next()
    }

    /// Remove `delete_count` values at `start`, inserting `items` in their
    /// place. Returns the removed values.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        if !self.mode.writable() {
            warn!(start, "ignored splice through read-only handle");
            return Vec::new();
        }
        let _pause = PauseTracking::new();
        let (removed, new_len) = {
            let mut backing = self.store.items.write();
            let start = start.min(backing.len());
            let end = (start + delete_count).min(backing.len());
            let removed: Vec<Value> = backing
                .splice(start..end, items.into_iter().map(|v| v.normalized()))
                .collect();
            (removed, backing.len())
        };
        if self.mode.triggers() {
            self.store
                .tracker
                .trigger_restructure(self.store.id, start, new_len);
        }
        removed
    }

    /// Whether the sequence contains `needle`, by same-value comparison.
    /// Container values match by store identity regardless of handle mode.
    pub fn contains(&self, needle: &Value) -> bool {
        self.index_of(needle).is_some()
    }

    /// First index holding `needle`, by same-value comparison.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Length);
        }
        let items = self.snapshot();
        for (i, item) in items.iter().enumerate() {
            if self.mode.tracks() {
                self.store.tracker.track(self.store.id, DepKey::Index(i));
            }
            if item.same_value(needle) {
                return Some(i);
            }
        }
        None
    }

    /// Last index holding `needle`, by same-value comparison.
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Length);
        }
        let items = self.snapshot();
        let mut found = None;
        for (i, item) in items.iter().enumerate() {
            if self.mode.tracks() {
                self.store.tracker.track(self.store.id, DepKey::Index(i));
            }
            if item.same_value(needle) {
                found = Some(i);
            }
        }
        found
    }

    /// Snapshot of every item, subscribing to the length and each index.
    pub fn to_vec(&self) -> Vec<Value> {
        if self.mode.tracks() {
            self.store.tracker.track(self.store.id, DepKey::Length);
        }
        let items = self.snapshot();
        items
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                if self.mode.tracks() {
                    self.store.tracker.track(self.store.id, DepKey::Index(i));
                }
                v.with_mode(self.mode.child())
            })
            .collect()
    }

    fn snapshot(&self) -> Vec<Value> {
        self.store.items.read().clone()
    }
}
