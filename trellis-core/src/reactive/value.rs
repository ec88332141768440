//! Dynamic value model for observed state.
//!
//! Reactive containers hold [`Value`]s: scalars plus handles to nested
//! observed containers. Container handles are cheap clones over a shared
//! store, so identity questions ("is this the same list?") reduce to pointer
//! identity of the store: re-wrapping a container always yields a handle
//! over the same store, which is what makes wrapping idempotent.
//!
//! Equality throughout the engine uses *same-value* semantics: two NaNs are
//! equal (writing NaN over NaN does not trigger) and containers compare by
//! store identity regardless of the access mode of the handle.

use std::collections::HashSet;
use std::sync::Arc;

use super::collection::{ReactiveMap, ReactiveSet};
use super::list::ReactiveList;
use super::record::ReactiveRecord;
use super::tracker::TargetId;

/// Access mode of a container handle.
///
/// The mode lives on the handle, not the store: several handles with
/// different modes can view the same data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reads track, writes trigger, nested reads wrap deeply.
    Deep,
    /// Reads track, writes trigger, nested containers come back raw.
    Shallow,
    /// Reads do not track; writes are ignored; nested reads are read-only.
    ReadOnly,
    /// Read-only surface, raw nested containers.
    ShallowReadOnly,
    /// Direct access to the backing store: no tracking, no triggering.
    Raw,
}

impl Mode {
    /// Whether reads through this handle establish dependencies.
    pub(crate) fn tracks(self) -> bool {
        matches!(self, Mode::Deep | Mode::Shallow)
    }

    /// Whether writes through this handle are permitted.
    pub(crate) fn writable(self) -> bool {
        !matches!(self, Mode::ReadOnly | Mode::ShallowReadOnly)
    }

    /// Whether writes through this handle notify subscribers.
    pub(crate) fn triggers(self) -> bool {
        self != Mode::Raw
    }

    /// Mode applied to nested containers read through this handle.
    pub(crate) fn child(self) -> Mode {
        match self {
            Mode::Deep => Mode::Deep,
            Mode::ReadOnly => Mode::ReadOnly,
            // Shallow access returns nested structures unwrapped.
            Mode::Shallow | Mode::ShallowReadOnly | Mode::Raw => Mode::Raw,
        }
    }
}

/// A dynamically typed value stored in, and read from, observed containers.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    List(ReactiveList),
    Record(ReactiveRecord),
    Set(ReactiveSet),
    Map(ReactiveMap),
}

impl Value {
    /// Same-value equality: NaN equals NaN, containers compare by store
    /// identity, access modes are ignored.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Hashable projection of this value, used for set membership and map
    /// keys. Containers project to their target identity.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Number(n) => ValueKey::Number(canonical_bits(*n)),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::List(l) => ValueKey::Target(l.target_id()),
            Value::Record(r) => ValueKey::Target(r.target_id()),
            Value::Set(s) => ValueKey::Target(s.target_id()),
            Value::Map(m) => ValueKey::Target(m.target_id()),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::List(_) | Value::Record(_) | Value::Set(_) | Value::Map(_)
        )
    }

    /// Re-mode container handles; scalars pass through.
    pub(crate) fn with_mode(&self, mode: Mode) -> Value {
        match self {
            Value::List(l) => Value::List(l.with_mode(mode)),
            Value::Record(r) => Value::Record(r.with_mode(mode)),
            Value::Set(s) => Value::Set(s.with_mode(mode)),
            Value::Map(m) => Value::Map(m.with_mode(mode)),
            other => other.clone(),
        }
    }

    /// Canonical form for storage: container handles are stored in deep mode
    /// so that read-only or raw views never leak into backing data.
    pub(crate) fn normalized(&self) -> Value {
        self.with_mode(Mode::Deep)
    }

    /// Deep-read every reachable entry, establishing dependencies on all of
    /// it. Used by value-source watchers.
    pub fn touch(&self) {
        let mut seen = HashSet::new();
        self.touch_into(&mut seen);
    }

    fn touch_into(&self, seen: &mut HashSet<TargetId>) {
        match self {
            Value::List(list) => {
                if seen.insert(list.target_id()) {
                    for item in list.to_vec() {
                        item.touch_into(seen);
                    }
                }
            }
            Value::Record(record) => {
                if seen.insert(record.target_id()) {
                    for (_, value) in record.entries() {
                        value.touch_into(seen);
                    }
                }
            }
            Value::Set(set) => {
                if seen.insert(set.target_id()) {
                    for item in set.to_vec() {
                        item.touch_into(seen);
                    }
                }
            }
            Value::Map(map) => {
                if seen.insert(map.target_id()) {
                    for (key, value) in map.entries() {
                        key.touch_into(seen);
                        value.touch_into(seen);
                    }
                }
            }
            _ => {}
        }
    }

    /// Untracked structural snapshot as JSON. Containers serialize by
    /// contents; sets become arrays, maps become objects with stringified
    /// keys.
    pub fn to_json(&self) -> serde_json::Value {
        super::context::untracked(|| self.to_json_inner())
    }

    fn to_json_inner(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.to_string()),
            Value::List(list) => serde_json::Value::Array(
                list.to_vec().iter().map(Value::to_json_inner).collect(),
            ),
            Value::Record(record) => serde_json::Value::Object(
                record
                    .entries()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json_inner()))
                    .collect(),
            ),
            Value::Set(set) => serde_json::Value::Array(
                set.to_vec().iter().map(Value::to_json_inner).collect(),
            ),
            Value::Map(map) => serde_json::Value::Object(
                map.entries()
                    .iter()
                    .map(|(k, v)| (k.key().display(), v.to_json_inner()))
                    .collect(),
            ),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::List(l) => write!(f, "List({:?})", l.target_id()),
            Value::Record(r) => write!(f, "Record({:?})", r.target_id()),
            Value::Set(s) => write!(f, "Set({:?})", s.target_id()),
            Value::Map(m) => write!(f, "Map({:?})", m.target_id()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v.as_str()))
    }
}

/// Hashable projection of a [`Value`], with same-value semantics baked into
/// `Eq`/`Hash` (NaN canonicalized, negative zero folded into zero).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Number(u64),
    Text(Arc<str>),
    Target(TargetId),
}

impl ValueKey {
    /// Human-readable rendering used when projecting map keys to JSON.
    pub(crate) fn display(&self) -> String {
        match self {
            ValueKey::Null => "null".to_string(),
            ValueKey::Bool(b) => b.to_string(),
            ValueKey::Number(bits) => f64::from_bits(*bits).to_string(),
            ValueKey::Text(s) => s.to_string(),
            ValueKey::Target(id) => format!("{id:?}"),
        }
    }
}

fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}
