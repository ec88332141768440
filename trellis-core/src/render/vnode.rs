//! Virtual tree nodes.
//!
//! A [`VNode`] is one node of the lightweight description tree the renderer
//! reconciles against its previous snapshot. Nodes carry a non-owning
//! back-reference (`el`) to the platform node they were realized as; the
//! differ relies on it to reuse, move and anchor real nodes.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

/// What kind of node this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VTag {
    /// A named element.
    Element(String),
    /// A text node; content lives in [`VChildren::Text`].
    Text,
    /// A comment node; content lives in [`VChildren::Text`].
    Comment,
    /// A keyless grouping node realizing only its children.
    Fragment,
}

/// Identity of a node among its siblings. Keys must be unique within one
/// children list; duplicate keys are a caller error the differ does not
/// detect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VKey {
    Int(i64),
    Text(String),
}

impl From<i64> for VKey {
    fn from(v: i64) -> Self {
        VKey::Int(v)
    }
}

impl From<&str> for VKey {
    fn from(v: &str) -> Self {
        VKey::Text(v.to_string())
    }
}

/// An event delivered to a handler by the platform adapter.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    /// Platform clock reading at dispatch time; compared against listener
    /// attachment time to discard stale deliveries.
    pub time_stamp: f64,
}

/// Shared event handler. Handlers compare by identity.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// One property of an element node.
#[derive(Clone)]
pub enum PropValue {
    /// Presentation attribute data.
    Attr(serde_json::Value),
    /// An event handler, keyed by an `on`-prefixed prop name.
    Handler(EventHandler),
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Attr(a), PropValue::Attr(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for PropValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropValue::Attr(v) => write!(f, "Attr({v})"),
            PropValue::Handler(_) => write!(f, "Handler"),
        }
    }
}

/// The children slot of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum VChildren<N> {
    /// No children.
    None,
    /// Text content (also the content of Text/Comment nodes).
    Text(String),
    /// A list of child nodes.
    Nodes(Vec<VNode<N>>),
}

/// One node of the description tree.
#[derive(Debug, Clone)]
pub struct VNode<N> {
    pub tag: VTag,
    pub props: IndexMap<String, PropValue>,
    pub children: VChildren<N>,
    pub key: Option<VKey>,
    /// The realized platform node, filled in at mount and carried forward on
    /// patch.
    pub(crate) el: RefCell<Option<N>>,
}

impl<N: Clone> VNode<N> {
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: VTag::Element(tag.into()),
            props: IndexMap::new(),
            children: VChildren::None,
            key: None,
            el: RefCell::new(None),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            tag: VTag::Text,
            props: IndexMap::new(),
            children: VChildren::Text(content.into()),
            key: None,
            el: RefCell::new(None),
        }
    }

    pub fn comment(content: impl Into<String>) -> Self {
        Self {
            tag: VTag::Comment,
            props: IndexMap::new(),
            children: VChildren::Text(content.into()),
            key: None,
            el: RefCell::new(None),
        }
    }

    pub fn fragment(children: Vec<VNode<N>>) -> Self {
        Self {
            tag: VTag::Fragment,
            props: IndexMap::new(),
            children: VChildren::Nodes(children),
            key: None,
            el: RefCell::new(None),
        }
    }

    pub fn key(mut self, key: impl Into<VKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(name.into(), PropValue::Attr(value.into()));
        self
    }

    pub fn on(mut self, event: impl AsRef<str>, handler: EventHandler) -> Self {
        self.props
            .insert(format!("on{}", event.as_ref()), PropValue::Handler(handler));
        self
    }

    pub fn children(mut self, children: Vec<VNode<N>>) -> Self {
        self.children = VChildren::Nodes(children);
        self
    }

    pub fn text_children(mut self, content: impl Into<String>) -> Self {
        self.children = VChildren::Text(content.into());
        self
    }

    /// Text content, for Text/Comment nodes.
    pub(crate) fn content(&self) -> &str {
        match &self.children {
            VChildren::Text(s) => s,
            _ => "",
        }
    }

    pub(crate) fn set_el(&self, node: N) {
        *self.el.borrow_mut() = Some(node);
    }

    /// The realized platform node, if mounted.
    pub fn el(&self) -> Option<N> {
        self.el.borrow().clone()
    }

    /// Whether `other` describes the same node (same tag, same key), meaning
    /// the realized node can be patched in place.
    pub(crate) fn same_node(&self, other: &VNode<N>) -> bool {
        self.tag == other.tag && self.key == other.key
    }
}

impl<N> PartialEq for VNode<N>
where
    VChildren<N>: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.key == other.key
            && self.props == other.props
            && self.children == other.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assembles_element() {
        let node: VNode<u32> = VNode::element("div")
            .key(1)
            .attr("id", "root")
            .children(vec![VNode::text("hi")]);

        assert_eq!(node.tag, VTag::Element("div".into()));
        assert_eq!(node.key, Some(VKey::Int(1)));
        assert!(matches!(&node.children, VChildren::Nodes(kids) if kids.len() == 1));
    }

    #[test]
    fn handlers_compare_by_identity() {
        let a: EventHandler = Arc::new(|_| {});
        let b: EventHandler = Arc::new(|_| {});

        assert_eq!(
            PropValue::Handler(a.clone()),
            PropValue::Handler(a.clone())
        );
        assert_ne!(PropValue::Handler(a), PropValue::Handler(b));
    }

    #[test]
    fn nodes_compare_structurally() {
        let make = || {
            VNode::<u32>::element("div")
                .key(1)
                .attr("id", "root")
                .children(vec![VNode::text("hi")])
        };

        assert_eq!(make(), make());
        assert_ne!(make(), make().attr("id", "other"));
        assert_ne!(make(), make().children(vec![VNode::text("bye")]));
    }

    #[test]
    fn same_node_requires_tag_and_key() {
        let a: VNode<u32> = VNode::element("p").key(1);
        let b: VNode<u32> = VNode::element("p").key(1);
        let c: VNode<u32> = VNode::element("p").key(2);
        let d: VNode<u32> = VNode::element("div").key(1);

        assert!(a.same_node(&b));
        assert!(!a.same_node(&c));
        assert!(!a.same_node(&d));
    }
}
