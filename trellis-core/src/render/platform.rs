//! Platform adapter seam.
//!
//! The renderer never touches a concrete node API; every realized-tree
//! operation routes through a [`Platform`] implementation supplied by the
//! embedder. The crate ships no concrete adapter; integration tests carry an
//! in-memory one, and [`super::props`] provides the building blocks a real
//! adapter composes for property patching.

use super::vnode::PropValue;

/// Everything the renderer needs from a target node tree.
pub trait Platform {
    /// Handle to a realized node. Clones must refer to the same node.
    type Node: Clone;

    fn create_element(&self, tag: &str) -> Self::Node;
    fn create_text(&self, content: &str) -> Self::Node;
    fn create_comment(&self, content: &str) -> Self::Node;

    /// Replace the entire text content of an element.
    fn set_element_text(&self, el: &Self::Node, content: &str);
    /// Update the content of a text node.
    fn set_text(&self, node: &Self::Node, content: &str);
    /// Update the content of a comment node.
    fn set_comment(&self, node: &Self::Node, content: &str);

    /// Insert `child` into `parent` before `anchor`, or append when no anchor
    /// is given. Inserting an already attached node moves it.
    fn insert(&self, child: &Self::Node, parent: &Self::Node, anchor: Option<&Self::Node>);
    fn remove(&self, node: &Self::Node);

    /// Apply one property change. `old`/`new` are the previous and next
    /// values; an absent `new` removes the property.
    fn patch_prop(&self, el: &Self::Node, key: &str, old: Option<&PropValue>, new: Option<&PropValue>);
}
