//! Error types for the Trellis core.
//!
//! The reactive layer has exactly one recoverable error class: attempting to
//! mutate data through a read-only handle. The default `set`-style methods
//! log and ignore such writes; the `try_`-variants surface this error instead.
//!
//! Everything else is either a documented precondition (duplicate keys during
//! reconciliation) or a panic that propagates out of a computation body.

use thiserror::Error;

/// Errors reported by the reactive layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A write was attempted through a read-only handle.
    ///
    /// The underlying data is left unchanged and no subscribers are notified.
    #[error("cannot mutate read-only value at key `{key}`")]
    ReadOnly {
        /// The key the caller tried to write.
        key: String,
    },
}
