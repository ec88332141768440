//! Source watchers.
//!
//! A [`Watch`] observes a source (a getter over reactive state, or a
//! container watched deeply) and invokes a callback with the new and
//! previous values when the source changes. Unlike a plain effect, the
//! callback is not itself tracked: only the source establishes dependencies.
//!
//! Callbacks can race when the source changes again while an earlier
//! callback's asynchronous work is still pending. The callback receives an
//! [`OnInvalidate`] registrar for that case: a hook registered during one
//! invocation runs right before the next one, letting the earlier invocation
//! mark its own work stale.

use std::sync::Arc;

use parking_lot::Mutex;

use super::effect::{Effect, EffectOptions, SchedulerFn};
use super::scheduler::FlushDriver;
use super::tracker::Tracker;
use super::value::Value;

/// When a watcher's callback runs relative to the write that triggered it.
#[derive(Clone, Default)]
pub enum Flush {
    /// Synchronously, inside the write.
    #[default]
    Sync,
    /// Deferred through a driver, after the write returns.
    Post(Arc<dyn FlushDriver>),
}

/// Options accepted by [`Watch::new`].
#[derive(Default)]
pub struct WatchOptions {
    /// Invoke the callback once at creation, with a null previous value.
    pub immediate: bool,
    pub flush: Flush,
}

/// Registrar for staleness hooks, handed to watch callbacks.
pub struct OnInvalidate {
    slot: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl OnInvalidate {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Register a hook to run right before the next callback invocation.
    /// Registering again replaces the previous hook.
    pub fn register(&self, hook: impl FnOnce() + Send + 'static) {
        *self.slot.lock() = Some(Box::new(hook));
    }

    fn run_pending(&self) {
        if let Some(hook) = self.slot.lock().take() {
            hook();
        }
    }
}

struct WatchState {
    produced: Arc<Mutex<Value>>,
    previous: Mutex<Value>,
    invalidate: OnInvalidate,
    callback: Box<dyn Fn(&Value, &Value, &OnInvalidate) + Send + Sync>,
}

impl WatchState {
    /// Re-evaluate the source and deliver (new, old) to the callback.
    fn fire(&self, effect: &Effect) {
        effect.run();
        let new = self.produced.lock().clone();
        self.invalidate.run_pending();
        let old = std::mem::replace(&mut *self.previous.lock(), new.clone());
        (self.callback)(&new, &old, &self.invalidate);
    }
}

/// An active watcher. Dropping the handle does not stop it; call
/// [`Watch::stop`].
pub struct Watch {
    effect: Effect,
}

impl Watch {
    /// Watch a getter over reactive state.
    pub fn new(
        tracker: &Arc<Tracker>,
        getter: impl Fn() -> Value + Send + Sync + 'static,
        callback: impl Fn(&Value, &Value, &OnInvalidate) + Send + Sync + 'static,
        options: WatchOptions,
    ) -> Self {
        let produced = Arc::new(Mutex::new(Value::Null));
        let state = Arc::new(WatchState {
            produced: produced.clone(),
            previous: Mutex::new(Value::Null),
            invalidate: OnInvalidate::new(),
            callback: Box::new(callback),
        });

        let job: Arc<dyn Fn(&Effect) + Send + Sync> = {
            let state = state.clone();
            Arc::new(move |effect: &Effect| state.fire(effect))
        };
        let scheduler: SchedulerFn = match options.flush {
            Flush::Sync => job.clone(),
            Flush::Post(driver) => {
                let job = job.clone();
                Arc::new(move |effect: &Effect| {
                    let job = job.clone();
                    let effect = effect.clone();
                    driver.defer(Box::new(move || job(&effect)));
                })
            }
        };

        let effect = Effect::with_options(
            tracker,
            move || *produced.lock() = getter(),
            EffectOptions {
                lazy: true,
                scheduler: Some(scheduler),
            },
        );

        if options.immediate {
            state.fire(&effect);
        } else {
            // Establish dependencies and the baseline previous value without
            // invoking the callback.
            effect.run();
            *state.previous.lock() = state.produced.lock().clone();
        }

        Self { effect }
    }

    /// Watch a container (or any value) deeply: every reachable entry is a
    /// dependency, so nested writes fire the callback.
    pub fn value(
        tracker: &Arc<Tracker>,
        source: Value,
        callback: impl Fn(&Value, &Value, &OnInvalidate) + Send + Sync + 'static,
        options: WatchOptions,
    ) -> Self {
        Self::new(
            tracker,
            move || {
                source.touch();
                source.clone()
            },
            callback,
            options,
        )
    }

    /// Stop watching. The callback never fires again.
    pub fn stop(&self) {
        self.effect.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::record::ReactiveRecord;
    use crate::reactive::scheduler::QueuedDriver;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    #[test]
    fn callback_sees_old_and_new() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let state_clone = state.clone();
        let _watch = Watch::new(
            &tracker,
            move || state_clone.get("n"),
            move |new, old, _| {
                seen_clone
                    .lock()
                    .push((old.as_number(), new.as_number()));
            },
            WatchOptions::default(),
        );

        state.set("n", 2);
        state.set("n", 5);

        let seen = seen.lock();
        assert_eq!(*seen, vec![(Some(1.0), Some(2.0)), (Some(2.0), Some(5.0))]);
    }

    #[test]
    fn immediate_fires_with_null_old() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 7);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let state_clone = state.clone();
        let _watch = Watch::new(
            &tracker,
            move || state_clone.get("n"),
            move |new, old, _| {
                seen_clone.lock().push((old.is_null(), new.as_number()));
            },
            WatchOptions {
                immediate: true,
                ..Default::default()
            },
        );

        assert_eq!(*seen.lock(), vec![(true, Some(7.0))]);
    }

    #[test]
    fn invalidation_hook_runs_before_next_callback() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 0);
        let stale = Arc::new(AtomicBool::new(false));
        let stale_at_delivery = Arc::new(Mutex::new(Vec::new()));

        let stale_clone = stale.clone();
        let delivery_clone = stale_at_delivery.clone();
        let state_clone = state.clone();
        let _watch = Watch::new(
            &tracker,
            move || state_clone.get("n"),
            move |_, _, invalidate| {
                delivery_clone
                    .lock()
                    .push(stale_clone.load(Ordering::SeqCst));
                stale_clone.store(false, Ordering::SeqCst);
                let stale = stale_clone.clone();
                invalidate.register(move || stale.store(true, Ordering::SeqCst));
            },
            WatchOptions::default(),
        );

        state.set("n", 1);
        state.set("n", 2);

        // The first delivery starts fresh; the second is preceded by the
        // first delivery's staleness hook.
        assert_eq!(*stale_at_delivery.lock(), vec![false, true]);
    }

    #[test]
    fn post_flush_defers_until_drain() {
        let tracker = Tracker::new();
        let driver = QueuedDriver::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 0);
        let fired = Arc::new(AtomicI32::new(0));

        let fired_clone = fired.clone();
        let state_clone = state.clone();
        let _watch = Watch::new(
            &tracker,
            move || state_clone.get("n"),
            move |_, _, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions {
                immediate: false,
                flush: Flush::Post(driver.clone()),
            },
        );

        state.set("n", 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        driver.drain();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deep_source_sees_nested_writes() {
        let tracker = Tracker::new();
        let outer = ReactiveRecord::new(&tracker);
        let inner = ReactiveRecord::new(&tracker);
        inner.set("leaf", 1);
        outer.set("inner", crate::reactive::value::Value::Record(inner.clone()));
        let fired = Arc::new(AtomicI32::new(0));

        let fired_clone = fired.clone();
        let _watch = Watch::value(
            &tracker,
            crate::reactive::value::Value::Record(outer.clone()),
            move |_, _, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::default(),
        );

        inner.set("leaf", 2);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stopped_watch_never_fires() {
        let tracker = Tracker::new();
        let state = ReactiveRecord::new(&tracker);
        state.set("n", 0);
        let fired = Arc::new(AtomicI32::new(0));

        let fired_clone = fired.clone();
        let state_clone = state.clone();
        let watch = Watch::new(
            &tracker,
            move || state_clone.get("n"),
            move |_, _, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::default(),
        );

        watch.stop();
        state.set("n", 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
