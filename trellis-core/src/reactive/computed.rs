//! Cached derived values.
//!
//! A [`Computed`] wraps a getter in a lazy effect. The getter does not run at
//! construction and does not re-run on every invalidation; invalidation only
//! marks the cache dirty and notifies readers of the derived value. The
//! getter runs again on the next read.
//!
//! The derived value is itself an observed target: computations that read it
//! subscribe to its value cell, so invalidation chains compose: an effect
//! reading a computed re-runs when the computed's own sources change, without
//! the computed recomputing eagerly in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::context::untracked;
use super::effect::{Effect, EffectOptions, SchedulerFn};
use super::tracker::{ChangeKind, DepKey, TargetId, Tracker};

struct ComputedCell<T> {
    id: TargetId,
    tracker: Arc<Tracker>,
    dirty: Arc<AtomicBool>,
    cache: Arc<RwLock<Option<T>>>,
    getter: Arc<dyn Fn() -> T + Send + Sync>,
    effect: Effect,
}

/// A lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed<T> {
    cell: Arc<ComputedCell<T>>,
}

impl<T: Clone + Send + Sync + 'static> Computed<T> {
    /// Wrap `getter` in a cached cell. The getter does not run until the
    /// first [`Computed::get`].
    pub fn new(tracker: &Arc<Tracker>, getter: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let id = TargetId::next();
        let dirty = Arc::new(AtomicBool::new(true));
        let cache: Arc<RwLock<Option<T>>> = Arc::new(RwLock::new(None));
        let getter: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(getter);

        // Invalidation only marks the cache stale and wakes readers of the
        // value cell; recomputation waits for the next read.
        let scheduler: SchedulerFn = {
            let dirty = dirty.clone();
            let tracker = tracker.clone();
            Arc::new(move |_effect| {
                if !dirty.swap(true, Ordering::SeqCst) {
                    trace!(?id, "derived value invalidated");
                    tracker.trigger(id, &DepKey::Value, ChangeKind::Set, None);
                }
            })
        };

        let effect = {
            let cache = cache.clone();
            let getter = getter.clone();
            Effect::with_options(
                tracker,
                move || {
                    *cache.write() = Some(getter());
                },
                EffectOptions {
                    lazy: true,
                    scheduler: Some(scheduler),
                },
            )
        };

        Self {
            cell: Arc::new(ComputedCell {
                id,
                tracker: tracker.clone(),
                dirty,
                cache,
                getter,
                effect,
            }),
        }
    }

    /// Read the derived value, recomputing only if a source changed since the
    /// last read. Subscribes the running computation to the value cell.
    pub fn get(&self) -> T {
        if self.cell.dirty.swap(false, Ordering::SeqCst) {
            if self.cell.effect.is_stopped() {
                // The tracking effect is gone, so evaluate without
                // subscribing to anything; the result can never go stale
                // in a way the cell would hear about.
                let value = untracked(|| (self.cell.getter)());
                *self.cell.cache.write() = Some(value);
            } else {
                self.cell.effect.run();
            }
        }
        self.cell.tracker.track(self.cell.id, DepKey::Value);
        if let Some(value) = self.cell.cache.read().clone() {
            return value;
        }
        // Another reader swapped the dirty flag but has not filled the cache
        // yet; evaluate for ourselves rather than wait.
        let value = untracked(|| (self.cell.getter)());
        *self.cell.cache.write() = Some(value.clone());
        value
    }

    /// Stop tracking. Reads keep working: the cached value is returned, or
    /// the getter is evaluated once untracked when nothing was cached yet.
    pub fn stop(&self) {
        self.cell.effect.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::record::ReactiveRecord;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn getter_is_lazy_and_cached() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 2);
        let computations = Arc::new(AtomicI32::new(0));

        let computations_clone = computations.clone();
        let state_clone = state.clone();
        let doubled = Computed::new(&tracker, move || {
            computations_clone.fetch_add(1, Ordering::SeqCst);
            state_clone.get("n").as_number().unwrap_or(0.0) * 2.0
        });

        assert_eq!(computations.load(Ordering::SeqCst), 0);

        assert_eq!(doubled.get(), 4.0);
        assert_eq!(doubled.get(), 4.0);
        assert_eq!(computations.load(Ordering::SeqCst), 1);

        state.set("n", 3);
        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert_eq!(doubled.get(), 6.0);
        assert_eq!(computations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effects_chain_through_derived_values() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 1);
        let runs = Arc::new(AtomicI32::new(0));
        let seen = Arc::new(AtomicI32::new(0));

        let state_clone = state.clone();
        let doubled = Computed::new(&tracker, move || {
            state_clone.get("n").as_number().unwrap_or(0.0) * 2.0
        });

        let runs_clone = runs.clone();
        let seen_clone = seen.clone();
        let doubled_clone = doubled.clone();
        let _effect = Effect::new(&tracker, move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            seen_clone.store(doubled_clone.get() as i32, Ordering::SeqCst);
        });

        assert_eq!(seen.load(Ordering::SeqCst), 2);

        state.set("n", 5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn unchanged_source_writes_do_not_invalidate() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 1);
        let computations = Arc::new(AtomicI32::new(0));

        let computations_clone = computations.clone();
        let state_clone = state.clone();
        let c = Computed::new(&tracker, move || {
            computations_clone.fetch_add(1, Ordering::SeqCst);
            state_clone.get("n").as_number().unwrap_or(0.0)
        });

        let _ = c.get();
        state.set("n", 1);
        let _ = c.get();
        assert_eq!(computations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_before_first_read_still_evaluates() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 3);

        let state_clone = state.clone();
        let c = Computed::new(&tracker, move || {
            state_clone.get("n").as_number().unwrap_or(0.0)
        });

        // Never read, then stopped: the first read evaluates once.
        c.stop();
        assert_eq!(c.get(), 3.0);

        // Untracked evaluation: later source writes change nothing.
        state.set("n", 8);
        assert_eq!(c.get(), 3.0);
    }

    #[test]
    fn stopped_computed_keeps_last_value() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 1);

        let state_clone = state.clone();
        let c = Computed::new(&tracker, move || {
            state_clone.get("n").as_number().unwrap_or(0.0)
        });
        assert_eq!(c.get(), 1.0);

        c.stop();
        state.set("n", 9);
        assert_eq!(c.get(), 1.0);
    }
}
