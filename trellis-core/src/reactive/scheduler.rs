//! Job Queue
//!
//! Deferred, coalescing execution for effects. Attaching a queue's scheduler
//! to an effect turns every invalidation into an enqueue; the queue keeps one
//! slot per effect, so a burst of writes between flushes re-runs the effect
//! once, observing only the final state.
//!
//! # How Flushing Works
//!
//! 1. The first enqueue after an idle period hands a flush callback to the
//!    queue's [`FlushDriver`]; further enqueues before that flush runs only
//!    extend the pending set.
//!
//! 2. The flush drains jobs front to back in enqueue order. Jobs enqueued
//!    *during* the flush join the same drain.
//!
//! 3. When the drain empties, the in-flight flag clears and the next enqueue
//!    schedules a fresh flush.
//!
//! The driver decides what "deferred" means: [`SyncDriver`] flushes on the
//! spot (coalescing only within one flush), [`QueuedDriver`] parks flushes
//! for an explicit drain (the unit-test clock), and [`TokioDriver`] spawns
//! the flush as a task on a runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::trace;

use super::effect::{Effect, EffectRef, SchedulerFn};

/// Strategy for running a flush callback at some later point.
pub trait FlushDriver: Send + Sync {
    fn defer(&self, flush: Box<dyn FnOnce() + Send>);
}

/// Runs the flush immediately on the calling thread.
pub struct SyncDriver;

impl FlushDriver for SyncDriver {
    fn defer(&self, flush: Box<dyn FnOnce() + Send>) {
        flush();
    }
}

/// Parks flush callbacks until [`QueuedDriver::drain`] is called. Gives tests
/// explicit control over when deferred work happens.
#[derive(Default)]
pub struct QueuedDriver {
    parked: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl QueuedDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run every parked flush, including any parked while draining.
    pub fn drain(&self) {
        loop {
            let batch = std::mem::take(&mut *self.parked.lock());
            if batch.is_empty() {
                return;
            }
            for flush in batch {
                flush();
            }
        }
    }

    /// Number of parked flushes. Test hook.
    pub fn parked(&self) -> usize {
        self.parked.lock().len()
    }
}

impl FlushDriver for QueuedDriver {
    fn defer(&self, flush: Box<dyn FnOnce() + Send>) {
        self.parked.lock().push(flush);
    }
}

/// Spawns the flush as a task on a tokio runtime.
pub struct TokioDriver {
    handle: tokio::runtime::Handle,
}

impl TokioDriver {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl FlushDriver for TokioDriver {
    fn defer(&self, flush: Box<dyn FnOnce() + Send>) {
        self.handle.spawn(async move { flush() });
    }
}

/// A coalescing queue of invalidated effects.
pub struct JobQueue {
    jobs: Mutex<IndexSet<EffectRef>>,
    flushing: AtomicBool,
    driver: Arc<dyn FlushDriver>,
}

impl JobQueue {
    pub fn new(driver: Arc<dyn FlushDriver>) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(IndexSet::new()),
            flushing: AtomicBool::new(false),
            driver,
        })
    }

    /// Queue flushing synchronously; useful when only per-flush coalescing is
    /// wanted.
    pub fn sync() -> Arc<Self> {
        Self::new(Arc::new(SyncDriver))
    }

    /// Add an effect to the pending set, scheduling a flush if none is in
    /// flight. Enqueueing an already pending effect is a no-op.
    pub fn enqueue(self: &Arc<Self>, effect: &Effect) {
        let inserted = self.jobs.lock().insert(effect.as_ref().clone());
        if inserted {
            trace!(effect = effect.id(), "job enqueued");
        }
        if !self.flushing.swap(true, Ordering::SeqCst) {
            let queue = self.clone();
            self.driver.defer(Box::new(move || queue.flush()));
        }
    }

    /// Drain the pending set in enqueue order.
    pub fn flush(&self) {
        loop {
            let job = self.jobs.lock().shift_remove_index(0);
            let Some(job) = job else {
                break;
            };
            if !job.is_stopped() {
                job.run();
            }
        }
        self.flushing.store(false, Ordering::SeqCst);
    }

    /// Adapt this queue into an effect scheduler.
    pub fn scheduler(self: &Arc<Self>) -> SchedulerFn {
        let queue = self.clone();
        Arc::new(move |effect| queue.enqueue(effect))
    }

    /// Number of pending jobs. Test hook.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }
}
