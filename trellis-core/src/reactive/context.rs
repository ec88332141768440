//! Reactive Context
//!
//! The reactive context tracks which computation is currently running so that
//! reads can attribute themselves to the right subscriber. It also carries the
//! tracking-pause counter used by operations that must read state without
//! establishing dependencies (length-mutating list methods, collection
//! instrumentation, `untracked`).
//!
//! # Implementation
//!
//! A thread-local stack holds the currently executing computations. Entering a
//! computation pushes it; the RAII guard pops it on drop, restoring the outer
//! computation as current. Nested computations therefore never mis-attribute
//! reads to their parent, and a panicking body still unwinds the stack
//! correctly.

use std::cell::{Cell, RefCell};

use super::effect::EffectRef;

thread_local! {
    static EFFECT_STACK: RefCell<Vec<EffectRef>> = const { RefCell::new(Vec::new()) };
    static PAUSE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Guard marking an effect as the currently running computation.
///
/// Dropping the guard pops the effect stack and restores the previous
/// computation, even when the effect body panics.
pub(crate) struct EffectScope;

impl EffectScope {
    pub(crate) fn enter(effect: EffectRef) -> Self {
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(effect));
        Self
    }
}

impl Drop for EffectScope {
    fn drop(&mut self) {
        EFFECT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The computation currently being tracked, if any.
pub(crate) fn current_effect() -> Option<EffectRef> {
    EFFECT_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Guard suppressing dependency capture for its lifetime.
///
/// Pausing nests; tracking resumes once every guard has dropped. Triggering is
/// unaffected, only `track` calls become no-ops.
pub(crate) struct PauseTracking;

impl PauseTracking {
    pub(crate) fn new() -> Self {
        PAUSE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for PauseTracking {
    fn drop(&mut self) {
        PAUSE_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

pub(crate) fn tracking_paused() -> bool {
    PAUSE_DEPTH.with(|depth| depth.get() > 0)
}

/// Run `f` without establishing any reactive dependencies.
///
/// Reads performed inside `f` are invisible to the currently running
/// computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = PauseTracking::new();
    f()
}
