//! Property patching building blocks.
//!
//! The crate ships no concrete platform adapter, but every adapter faces the
//! same property questions: how to normalize class values, how to manage
//! event listeners across handler swaps, when to prefer a direct property
//! over an attribute. The pieces here answer them once; an adapter composes
//! a [`PropPatcher`] over its element operations and forwards
//! `Platform::patch_prop` to it.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::warn;

use super::vnode::{Event, EventHandler, PropValue};

/// Flatten a class value to one space-joined string.
///
/// Strings pass through; arrays flatten recursively; objects contribute the
/// keys whose values are truthy. Numbers stringify; null and false-like
/// values contribute nothing.
pub fn normalize_class(value: &serde_json::Value) -> String {
    let mut parts = Vec::new();
    collect_class(value, &mut parts);
    parts.join(" ")
}

fn collect_class(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            if !s.is_empty() {
                out.push(s.clone());
            }
        }
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_class(item, out);
            }
        }
        serde_json::Value::Object(entries) => {
            for (name, enabled) in entries {
                if truthy(enabled) {
                    out.push(name.clone());
                }
            }
        }
        serde_json::Value::Null | serde_json::Value::Bool(_) => {}
    }
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// A stable listener wrapper around a swappable handler.
///
/// The platform listener is attached once per (element, event) pair and kept
/// across handler updates; swapping the handler is a field write, not a
/// re-subscription. Events stamped before the attachment time are discarded:
/// a delivery already in flight when the listener was attached must not reach
/// a handler that did not exist yet.
pub struct Invoker {
    attached: f64,
    handler: RwLock<EventHandler>,
}

impl Invoker {
    pub fn new(handler: EventHandler, attached: f64) -> Arc<Self> {
        Arc::new(Self {
            attached,
            handler: RwLock::new(handler),
        })
    }

    /// Swap the wrapped handler without touching the platform listener.
    pub fn replace(&self, handler: EventHandler) {
        *self.handler.write() = handler;
    }

    /// Deliver an event, unless it predates the listener.
    pub fn dispatch(&self, event: &Event) {
        if event.time_stamp < self.attached {
            return;
        }
        let handler = self.handler.read().clone();
        handler(event);
    }
}

/// Element-level operations a [`PropPatcher`] drives. Implemented by the
/// platform adapter over its own element handle.
pub trait ElementOps {
    type Elem: Clone;

    /// Whether the element defines `name` as a direct property.
    fn has_property(&self, el: &Self::Elem, name: &str) -> bool;
    /// Whether that property is boolean-typed.
    fn is_boolean_property(&self, el: &Self::Elem, name: &str) -> bool;
    fn set_property(&self, el: &Self::Elem, name: &str, value: serde_json::Value);
    fn set_attribute(&self, el: &Self::Elem, name: &str, value: String);
    fn remove_attribute(&self, el: &Self::Elem, name: &str);

    /// Attach the invoker as the listener for `event`. Called once per
    /// (element, event) pair; handler swaps reuse the attached invoker.
    fn add_listener(&self, el: &Self::Elem, event: &str, invoker: Arc<Invoker>);
    fn remove_listener(&self, el: &Self::Elem, event: &str);

    /// Stable identity of an element, for invoker bookkeeping.
    fn elem_id(&self, el: &Self::Elem) -> u64;

    /// Current platform clock reading, in the same unit event timestamps use.
    fn now(&self) -> f64;
}

/// Applies property changes to elements, routing each key through the
/// decision tree: listener keys, class, direct property, attribute fallback.
pub struct PropPatcher<E: ElementOps> {
    ops: E,
    invokers: Mutex<HashMap<(u64, String), Arc<Invoker>>>,
}

impl<E: ElementOps> PropPatcher<E> {
    pub fn new(ops: E) -> Self {
        Self {
            ops,
            invokers: Mutex::new(HashMap::new()),
        }
    }

    pub fn ops(&self) -> &E {
        &self.ops
    }

    /// Apply one property change; `new: None` removes the property.
    pub fn patch(
        &self,
        el: &E::Elem,
        key: &str,
        _old: Option<&PropValue>,
        new: Option<&PropValue>,
    ) {
        if let Some(event) = key.strip_prefix("on") {
            self.patch_listener(el, &event.to_ascii_lowercase(), new);
            return;
        }
        match new {
            Some(PropValue::Handler(_)) => {
                warn!(key, "handler bound to a key without the `on` prefix; ignored");
            }
            Some(PropValue::Attr(value)) => {
                if key == "class" {
                    self.ops.set_attribute(el, "class", normalize_class(value));
                } else if self.ops.has_property(el, key) {
                    // Boolean properties treat a bare (empty-string) attribute
                    // value as true.
                    let coerced = match value {
                        serde_json::Value::String(s)
                            if s.is_empty() && self.ops.is_boolean_property(el, key) =>
                        {
                            serde_json::Value::Bool(true)
                        }
                        other => other.clone(),
                    };
                    self.ops.set_property(el, key, coerced);
                } else {
                    self.ops.set_attribute(el, key, attr_text(value));
                }
            }
            None => {
                if self.ops.has_property(el, key) {
                    self.ops.set_property(el, key, serde_json::Value::Null);
                } else {
                    self.ops.remove_attribute(el, key);
                }
            }
        }
    }

    fn patch_listener(&self, el: &E::Elem, event: &str, new: Option<&PropValue>) {
        let slot = (self.ops.elem_id(el), event.to_string());
        match new {
            Some(PropValue::Handler(handler)) => {
                let mut invokers = self.invokers.lock();
                match invokers.get(&slot) {
                    Some(invoker) => invoker.replace(handler.clone()),
                    None => {
                        let invoker = Invoker::new(handler.clone(), self.ops.now());
                        invokers.insert(slot, invoker.clone());
                        self.ops.add_listener(el, event, invoker);
                    }
                }
            }
            Some(PropValue::Attr(_)) => {
                warn!(event, "non-handler value under an `on` key; listener removed");
                if self.invokers.lock().remove(&slot).is_some() {
                    self.ops.remove_listener(el, event);
                }
            }
            None => {
                if self.invokers.lock().remove(&slot).is_some() {
                    self.ops.remove_listener(el, event);
                }
            }
        }
    }
}

fn attr_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
