//! Tree reconciliation engine.
//!
//! Description trees ([`VNode`]) are diffed against their previous snapshot
//! by the [`Renderer`], which routes the minimal set of structural operations
//! through a caller-supplied [`Platform`] adapter. Keyed children go through
//! the move-minimizing fast diff; [`props`] carries the building blocks an
//! adapter composes for property and listener patching.

mod diff;
pub mod platform;
pub mod props;
pub mod renderer;
pub mod vnode;

pub use platform::Platform;
pub use props::{normalize_class, ElementOps, Invoker, PropPatcher};
pub use renderer::{Renderer, Root};
pub use vnode::{Event, EventHandler, PropValue, VChildren, VKey, VNode, VTag};
