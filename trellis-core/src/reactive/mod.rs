//! Reactive state engine.
//!
//! State lives in observed containers ([`ReactiveRecord`], [`ReactiveList`],
//! [`ReactiveSet`], [`ReactiveMap`]) holding dynamically typed [`Value`]s.
//! Computations ([`Effect`]) subscribe to what they read through a shared
//! [`Tracker`] and re-run when it changes. On top of that sit cached derived
//! values ([`Computed`]), source watchers ([`Watch`]) and a coalescing
//! [`JobQueue`] for deferred flushing.
//!
//! Everything is rooted in a [`Tracker`] instance; containers and
//! computations created against different trackers never interact.

pub mod collection;
pub mod computed;
mod context;
pub mod effect;
pub mod list;
pub mod record;
pub mod scheduler;
pub mod tracker;
pub mod value;
pub mod watch;

pub use collection::{ReactiveMap, ReactiveSet};
pub use computed::Computed;
pub use context::untracked;
pub use effect::{Effect, EffectOptions, SchedulerFn};
pub use list::ReactiveList;
pub use record::{ReactiveRecord, Ref};
pub use scheduler::{FlushDriver, JobQueue, QueuedDriver, SyncDriver, TokioDriver};
pub use tracker::{ChangeKind, DepKey, TargetId, Tracker};
pub use value::{Mode, Value, ValueKey};
pub use watch::{Flush, OnInvalidate, Watch, WatchOptions};
