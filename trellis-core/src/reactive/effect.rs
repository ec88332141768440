//! Effect Engine
//!
//! An effect is a unit of work that re-runs whenever the reactive state it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. Unless created lazy, the effect runs once immediately to establish its
//!    initial dependencies.
//!
//! 2. Every run starts with cleanup: the effect unsubscribes from every
//!    dependency recorded by the previous run. Reads from conditional branches
//!    that are no longer taken therefore stop re-triggering the effect.
//!
//! 3. While the body runs, the effect sits on the thread-local effect stack
//!    (see [`super::context`]); reads attribute themselves to the stack top,
//!    so nested effects track independently of their parents.
//!
//! 4. When a dependency changes, the effect re-runs synchronously, unless it
//!    carries a scheduler, in which case the scheduler is invoked with the
//!    effect and decides when (and whether) to run it.
//!
//! A lazy effect never runs until [`Effect::run`] is called explicitly; this
//! is the building block for cached derived values and watchers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::EffectScope;
use super::tracker::{DepKey, TargetId, Tracker};

/// Scheduler callback: invoked on invalidation instead of re-running the
/// effect directly.
pub type SchedulerFn = Arc<dyn Fn(&Effect) + Send + Sync>;

fn next_effect_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct EffectInner {
    id: u64,
    body: Box<dyn Fn() + Send + Sync>,
    scheduler: Option<SchedulerFn>,
    /// Every (target, key) pair the most recent run subscribed to. Cleared
    /// and rebuilt on each run.
    deps: Mutex<SmallVec<[(TargetId, DepKey); 8]>>,
    stopped: AtomicBool,
    tracker: Arc<Tracker>,
}

/// Shared handle used inside the dependency store. Equality and hashing go by
/// effect identity.
#[derive(Clone)]
pub(crate) struct EffectRef(Arc<EffectInner>);

impl PartialEq for EffectRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for EffectRef {}

impl std::hash::Hash for EffectRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl EffectRef {
    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }

    pub(crate) fn scheduler(&self) -> Option<SchedulerFn> {
        self.0.scheduler.clone()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.0.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn push_dep(&self, target: TargetId, key: DepKey) {
        self.0.deps.lock().push((target, key));
    }

    /// Execute the effect body, rebuilding its dependency set.
    pub(crate) fn run(&self) {
        if self.is_stopped() {
            return;
        }
        self.cleanup();
        let _scope = EffectScope::enter(self.clone());
        (self.0.body)();
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.0.deps.lock());
        for (target, key) in deps {
            self.0.tracker.remove_subscriber(target, &key, self);
        }
    }
}

/// Options accepted by [`Effect::with_options`].
#[derive(Default)]
pub struct EffectOptions {
    /// Suppress the immediate first run.
    pub lazy: bool,
    /// Reroute invalidation through a caller-supplied dispatch instead of an
    /// immediate re-run.
    pub scheduler: Option<SchedulerFn>,
}

/// A registered reactive computation.
///
/// Cloning the handle shares the underlying computation. Dropping every
/// handle leaves the effect alive only as long as the dependency store
/// references it; a stopped or never-retriggered effect becomes collectible
/// once its subscriptions are cleared.
#[derive(Clone)]
pub struct Effect {
    inner: EffectRef,
}

impl Effect {
    /// Create an effect and run it immediately to establish dependencies.
    pub fn new(tracker: &Arc<Tracker>, body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::with_options(tracker, body, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    pub fn with_options(
        tracker: &Arc<Tracker>,
        body: impl Fn() + Send + Sync + 'static,
        options: EffectOptions,
    ) -> Self {
        let inner = EffectRef(Arc::new(EffectInner {
            id: next_effect_id(),
            body: Box::new(body),
            scheduler: options.scheduler,
            deps: Mutex::new(SmallVec::new()),
            stopped: AtomicBool::new(false),
            tracker: tracker.clone(),
        }));
        if !options.lazy {
            inner.run();
        }
        Self { inner }
    }

    pub(crate) fn from_ref(inner: EffectRef) -> Self {
        Self { inner }
    }

    pub(crate) fn as_ref(&self) -> &EffectRef {
        &self.inner
    }

    /// Unique identifier of this effect.
    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    /// Force a synchronous run. Primarily used by lazy effects backing
    /// derived values.
    pub fn run(&self) {
        self.inner.run();
    }

    /// Permanently stop the effect and drop all of its subscriptions.
    pub fn stop(&self) {
        self.inner.0.stopped.store(true, Ordering::SeqCst);
        self.inner.cleanup();
    }

    /// Whether [`Effect::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
