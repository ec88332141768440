//! Patch Coordinator
//!
//! Walks an old and a new description tree together and routes the minimal
//! set of realized-tree operations through the [`Platform`] adapter.
//!
//! # How Patching Works
//!
//! 1. [`Renderer::render`] compares the incoming tree against the root's
//!    previous snapshot: mount when there was none, unmount when the new tree
//!    is absent, patch otherwise.
//!
//! 2. [`Renderer::patch`] dispatches on node kind. A tag or key mismatch
//!    means the realized node cannot be reused: unmount, then mount fresh.
//!    Matching Text/Comment nodes update content in place; matching elements
//!    diff props then reconcile children; fragments reconcile children
//!    directly against the shared container.
//!
//! 3. Children reconcile by shape: text replaces nodes wholesale, node lists
//!    go through the keyed differ when both sides are fully keyed and a
//!    positional walk otherwise.

use tracing::debug;

use super::platform::Platform;
use super::vnode::{VChildren, VNode, VTag};

/// One mounted tree and its previous description snapshot.
pub struct Root<N> {
    previous: Option<VNode<N>>,
}

impl<N> Root<N> {
    pub fn new() -> Self {
        Self { previous: None }
    }

    pub fn is_mounted(&self) -> bool {
        self.previous.is_some()
    }
}

impl<N> Default for Root<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The patch coordinator. Owns the platform adapter; per-container state
/// lives in [`Root`]s.
pub struct Renderer<P: Platform> {
    platform: P,
}

impl<P: Platform> Renderer<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Reconcile `next` against the root's previous snapshot inside
    /// `container`. `None` unmounts.
    pub fn render(
        &self,
        root: &mut Root<P::Node>,
        next: Option<VNode<P::Node>>,
        container: &P::Node,
    ) {
        match next {
            Some(node) => {
                debug!(mounted = root.is_mounted(), "render pass");
                self.patch(root.previous.as_ref(), &node, container, None);
                root.previous = Some(node);
            }
            None => {
                if let Some(previous) = root.previous.take() {
                    debug!("unmounting root");
                    self.unmount(&previous);
                }
            }
        }
    }

    /// Reconcile one node. `old: None` mounts `new` before `anchor`.
    pub(crate) fn patch(
        &self,
        old: Option<&VNode<P::Node>>,
        new: &VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        if let Some(old_node) = old {
            if !old_node.same_node(new) {
                self.unmount(old_node);
                self.patch(None, new, container, anchor);
                return;
            }
        }
        match (&new.tag, old) {
            (VTag::Element(_), None) => self.mount_element(new, container, anchor),
            (VTag::Element(_), Some(old_node)) => self.patch_element(old_node, new),
            (VTag::Text, None) => {
                let node = self.platform.create_text(new.content());
                new.set_el(node.clone());
                self.platform.insert(&node, container, anchor);
            }
            (VTag::Text, Some(old_node)) => {
                if let Some(el) = old_node.el() {
                    new.set_el(el.clone());
                    if old_node.content() != new.content() {
                        self.platform.set_text(&el, new.content());
                    }
                }
            }
            (VTag::Comment, None) => {
                let node = self.platform.create_comment(new.content());
                new.set_el(node.clone());
                self.platform.insert(&node, container, anchor);
            }
            (VTag::Comment, Some(old_node)) => {
                if let Some(el) = old_node.el() {
                    new.set_el(el.clone());
                    if old_node.content() != new.content() {
                        self.platform.set_comment(&el, new.content());
                    }
                }
            }
            (VTag::Fragment, None) => {
                if let VChildren::Nodes(kids) = &new.children {
                    for kid in kids {
                        self.patch(None, kid, container, anchor);
                    }
                }
            }
            (VTag::Fragment, Some(old_node)) => {
                self.patch_children(old_node, new, container);
            }
        }
    }

    fn mount_element(&self, node: &VNode<P::Node>, container: &P::Node, anchor: Option<&P::Node>) {
        let VTag::Element(tag) = &node.tag else {
            return;
        };
        let el = self.platform.create_element(tag);
        node.set_el(el.clone());
        for (key, value) in &node.props {
            self.platform.patch_prop(&el, key, None, Some(value));
        }
        match &node.children {
            VChildren::Text(text) => self.platform.set_element_text(&el, text),
            VChildren::Nodes(kids) => {
                for kid in kids {
                    self.patch(None, kid, &el, None);
                }
            }
            VChildren::None => {}
        }
        self.platform.insert(&el, container, anchor);
    }

    fn patch_element(&self, old: &VNode<P::Node>, new: &VNode<P::Node>) {
        let Some(el) = old.el() else {
            return;
        };
        new.set_el(el.clone());
        for (key, value) in &new.props {
            let prev = old.props.get(key);
            if prev != Some(value) {
                self.platform.patch_prop(&el, key, prev, Some(value));
            }
        }
        for (key, value) in &old.props {
            if !new.props.contains_key(key) {
                self.platform.patch_prop(&el, key, Some(value), None);
            }
        }
        self.patch_children(old, new, &el);
    }

    /// Reconcile children slots: every combination of text, node list and
    /// absent on both sides.
    fn patch_children(&self, old: &VNode<P::Node>, new: &VNode<P::Node>, container: &P::Node) {
        match &new.children {
            VChildren::Text(text) => {
                if let VChildren::Nodes(kids) = &old.children {
                    for kid in kids {
                        self.unmount(kid);
                    }
                }
                match &old.children {
                    VChildren::Text(prev) if prev == text => {}
                    _ => self.platform.set_element_text(container, text),
                }
            }
            VChildren::Nodes(new_kids) => match &old.children {
                VChildren::Nodes(old_kids) => {
                    if fully_keyed(old_kids) && fully_keyed(new_kids) {
                        self.patch_keyed_children(old_kids, new_kids, container);
                    } else {
                        self.patch_unkeyed_children(old_kids, new_kids, container);
                    }
                }
                VChildren::Text(_) => {
                    self.platform.set_element_text(container, "");
                    for kid in new_kids {
                        self.patch(None, kid, container, None);
                    }
                }
                VChildren::None => {
                    for kid in new_kids {
                        self.patch(None, kid, container, None);
                    }
                }
            },
            VChildren::None => match &old.children {
                VChildren::Nodes(kids) => {
                    for kid in kids {
                        self.unmount(kid);
                    }
                }
                VChildren::Text(_) => self.platform.set_element_text(container, ""),
                VChildren::None => {}
            },
        }
    }

    /// Positional fallback for children lists that are not fully keyed:
    /// patch pairwise, then mount the surplus or unmount the deficit.
    fn patch_unkeyed_children(
        &self,
        old: &[VNode<P::Node>],
        new: &[VNode<P::Node>],
        container: &P::Node,
    ) {
        let common = old.len().min(new.len());
        for i in 0..common {
            let anchor = old.get(i + 1).and_then(|n| n.el());
            self.patch(Some(&old[i]), &new[i], container, anchor.as_ref());
        }
        if new.len() > old.len() {
            for kid in &new[common..] {
                self.patch(None, kid, container, None);
            }
        } else {
            for kid in &old[common..] {
                self.unmount(kid);
            }
        }
    }

    /// Detach a node from the realized tree. Fragments detach their children;
    /// they have no realized node of their own.
    pub(crate) fn unmount(&self, node: &VNode<P::Node>) {
        if node.tag == VTag::Fragment {
            if let VChildren::Nodes(kids) = &node.children {
                for kid in kids {
                    self.unmount(kid);
                }
            }
            return;
        }
        if let Some(el) = node.el() {
            self.platform.remove(&el);
        }
    }

    /// Reposition an already realized node.
    pub(crate) fn move_node(
        &self,
        node: &VNode<P::Node>,
        container: &P::Node,
        anchor: Option<&P::Node>,
    ) {
        if let Some(el) = node.el() {
            self.platform.insert(&el, container, anchor);
        }
    }
}

fn fully_keyed<N>(nodes: &[VNode<N>]) -> bool {
    !nodes.is_empty() && nodes.iter().all(|n| n.key.is_some())
}
