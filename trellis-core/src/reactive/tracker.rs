//! Dependency Store
//!
//! The tracker is the bidirectional index at the heart of the reactive
//! engine: it maps (observed target, key) pairs to the set of computations
//! that read them, and walks that index backwards when a write occurs.
//!
//! # How It Works
//!
//! 1. While a computation runs, every read routes through [`Tracker::track`],
//!    which records the computation as a subscriber of the (target, key) pair
//!    and records the pair in the computation's own subscription list.
//!
//! 2. A write routes through [`Tracker::trigger`], which collects the
//!    subscribers affected by the change kind and re-runs each one (or hands
//!    it to its scheduler).
//!
//! 3. Before a computation re-runs it unsubscribes from every pair it
//!    previously depended on, so dependencies from abandoned conditional
//!    branches are dropped.
//!
//! Subscriber sets preserve insertion order, so computations re-run in the
//! order their subscriptions were first established.
//!
//! The tracker is a constructible instance rather than a hidden module-level
//! singleton: every reactive container and computation holds an `Arc` to the
//! tracker it was created against, which keeps the whole engine injectable in
//! tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use super::context;
use super::effect::{Effect, EffectRef};
use super::value::ValueKey;

/// Identity of one observed target (container or derived cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh target identity.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// One trackable aspect of an observed target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A named field of a record.
    Field(Arc<str>),
    /// One index of an ordered sequence.
    Index(usize),
    /// The length of an ordered sequence.
    Length,
    /// Structural reads: key enumeration and collection iteration. Adding or
    /// removing an entry invalidates these; setting an existing one does not.
    Iterate,
    /// Membership of one entry in a set-like or map-like collection.
    Entry(ValueKey),
    /// The cached cell of a derived value.
    Value,
}

/// Classification of a write, as seen by [`Tracker::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An existing entry changed in place.
    Set,
    /// A new entry appeared.
    Add,
    /// An entry disappeared.
    Remove,
}

type Subscribers = IndexMap<DepKey, IndexSet<EffectRef>>;

/// The process-wide dependency store.
pub struct Tracker {
    buckets: DashMap<TargetId, Subscribers>,
}

impl Tracker {
    /// Create a new, empty tracker.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            buckets: DashMap::new(),
        })
    }

    /// Record that the currently running computation depends on
    /// `(target, key)`.
    ///
    /// No-op when no computation is running or when tracking is paused.
    pub fn track(&self, target: TargetId, key: DepKey) {
        if context::tracking_paused() {
            return;
        }
        let Some(effect) = context::current_effect() else {
            return;
        };

        let fresh = {
            let mut bucket = self.buckets.entry(target).or_default();
            bucket.entry(key.clone()).or_default().insert(effect.clone())
        };
        if fresh {
            trace!(?target, ?key, effect = effect.id(), "dependency tracked");
            effect.push_dep(target, key);
        }
    }

    /// Drop one computation's subscription to `(target, key)`.
    ///
    /// Called during effect cleanup; empty entries are pruned.
    pub(crate) fn remove_subscriber(&self, target: TargetId, key: &DepKey, effect: &EffectRef) {
        let mut prune_target = false;
        if let Some(mut bucket) = self.buckets.get_mut(&target) {
            if let Some(subs) = bucket.get_mut(key) {
                subs.shift_remove(effect);
                if subs.is_empty() {
                    bucket.shift_remove(key);
                }
            }
            prune_target = bucket.is_empty();
        }
        if prune_target {
            self.buckets.remove_if(&target, |_, bucket| bucket.is_empty());
        }
    }

    /// Notify every computation affected by a write to `(target, key)`.
    ///
    /// The collected set is uniqueness-preserving and insertion-ordered, and
    /// never contains the computation currently executing (self-trigger
    /// suppression; a computation's own writes cannot recurse into it).
    ///
    /// `new_len` carries the sequence length after the write for ordered
    /// sequences, and doubles as the "target is a sequence" marker:
    /// - `Add` with `new_len` present also collects `Length` subscribers;
    /// - a `Length` write also collects subscribers of every index at or
    ///   beyond the new length (truncation invalidation).
    pub fn trigger(&self, target: TargetId, key: &DepKey, kind: ChangeKind, new_len: Option<usize>) {
        let current = context::current_effect();
        let mut to_run: IndexSet<EffectRef> = IndexSet::new();

        {
            let Some(bucket) = self.buckets.get(&target) else {
                return;
            };

            collect(&bucket, key, current.as_ref(), &mut to_run);

            if matches!(kind, ChangeKind::Add | ChangeKind::Remove) {
                collect(&bucket, &DepKey::Iterate, current.as_ref(), &mut to_run);
            }
            if kind == ChangeKind::Add && new_len.is_some() && *key != DepKey::Length {
                collect(&bucket, &DepKey::Length, current.as_ref(), &mut to_run);
            }
            if *key == DepKey::Length {
                if let Some(len) = new_len {
                    for (dep, subs) in bucket.iter() {
                        if let DepKey::Index(i) = dep {
                            if *i >= len {
                                merge(subs, current.as_ref(), &mut to_run);
                            }
                        }
                    }
                }
            }
        }

        self.run_all(target, to_run);
    }

    /// Notify the subscribers of several keys at once, running each affected
    /// computation a single time even when it subscribes to more than one of
    /// the keys. Used for map value replacement, which invalidates both the
    /// entry and value-visible iteration.
    pub(crate) fn trigger_many(&self, target: TargetId, keys: &[DepKey]) {
        let current = context::current_effect();
        let mut to_run: IndexSet<EffectRef> = IndexSet::new();

        {
            let Some(bucket) = self.buckets.get(&target) else {
                return;
            };
            for key in keys {
                collect(&bucket, key, current.as_ref(), &mut to_run);
            }
        }

        self.run_all(target, to_run);
    }

    /// Notify subscribers after an index-shifting sequence mutation
    /// (shift/unshift/splice/pop): every subscribed index at or beyond
    /// `start`, plus the length subscribers.
    pub(crate) fn trigger_restructure(&self, target: TargetId, start: usize, _new_len: usize) {
        let current = context::current_effect();
        let mut to_run: IndexSet<EffectRef> = IndexSet::new();

        {
            let Some(bucket) = self.buckets.get(&target) else {
                return;
            };
            for (dep, subs) in bucket.iter() {
                match dep {
                    DepKey::Index(i) if *i >= start => merge(subs, current.as_ref(), &mut to_run),
                    DepKey::Length | DepKey::Iterate => merge(subs, current.as_ref(), &mut to_run),
                    _ => {}
                }
            }
        }

        self.run_all(target, to_run);
    }

    fn run_all(&self, target: TargetId, to_run: IndexSet<EffectRef>) {
        if to_run.is_empty() {
            return;
        }
        debug!(?target, count = to_run.len(), "triggering subscribers");
        for effect in to_run {
            if effect.is_stopped() {
                continue;
            }
            match effect.scheduler() {
                Some(scheduler) => scheduler(&Effect::from_ref(effect)),
                None => effect.run(),
            }
        }
    }

    /// Number of targets currently carrying subscriptions. Test hook.
    #[cfg(test)]
    pub(crate) fn tracked_targets(&self) -> usize {
        self.buckets.len()
    }
}

fn collect(
    bucket: &Subscribers,
    key: &DepKey,
    current: Option<&EffectRef>,
    out: &mut IndexSet<EffectRef>,
) {
    if let Some(subs) = bucket.get(key) {
        merge(subs, current, out);
    }
}

fn merge(subs: &IndexSet<EffectRef>, current: Option<&EffectRef>, out: &mut IndexSet<EffectRef>) {
    for effect in subs {
        if Some(effect) != current {
            out.insert(effect.clone());
        }
    }
}
