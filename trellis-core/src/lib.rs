//! # Trellis Core
//!
//! The engine room of a reactive UI framework: fine-grained dependency
//! tracking over observed state, and keyed virtual-tree reconciliation that
//! turns description changes into minimal realized-tree operations.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────────────────────┐      ┌─────────────────────────────┐
//!  │         reactive           │      │           render            │
//!  │                            │      │                             │
//!  │  Tracker ── Effect ── Job  │      │  VNode ── Renderer ── diff  │
//!  │     │          │     Queue │      │              │              │
//!  │  Record/List/  Computed    │      │          Platform           │
//!  │  Set/Map/Ref   Watch       │      │          (adapter seam)     │
//!  └────────────────────────────┘      └─────────────────────────────┘
//! ```
//!
//! The two halves are independent: the reactive side knows nothing about
//! trees, the render side knows nothing about tracking. An embedder wires
//! them by re-rendering inside an effect, typically through a coalescing
//! [`reactive::JobQueue`].
//!
//! ## Example
//!
//! ```
//! use trellis_core::reactive::{Effect, ReactiveRecord, Tracker};
//!
//! let tracker = Tracker::new();
//! let state = ReactiveRecord::new(&tracker);
//! state.set("count", 0);
//!
//! let view = state.clone();
//! let _effect = Effect::new(&tracker, move || {
//!     let _ = view.get("count"); // subscribes
//! });
//!
//! state.set("count", 1); // re-runs the effect
//! ```

pub mod error;
pub mod reactive;
pub mod render;

pub use error::Error;
