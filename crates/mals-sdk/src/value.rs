//! Host-side values crossing the script boundary

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;

use crate::message::{Message, MessageRef};
use crate::types::{Kind, TypeDesc};

// ============================================================================
// Handle
// ============================================================================

/// Shared, type-erased handle for callables and opaque host objects.
///
/// Equality is identity: two handles are equal only when they point at the
/// same allocation.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Handle {
    /// Wrap a host object
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the wrapped object if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.inner).downcast_ref::<T>()
    }

    /// Check the wrapped object's type
    pub fn is<T: Any>(&self) -> bool {
        (*self.inner).is::<T>()
    }

    /// Rust type name of the wrapped object
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>", self.type_name)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// ============================================================================
// Containers
// ============================================================================

/// Ordered sequence with a declared element type
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    elem: TypeDesc,
    items: Vec<Value>,
}

impl Sequence {
    /// Create a sequence of `elem`
    pub fn new(elem: TypeDesc, items: Vec<Value>) -> Self {
        Self { elem, items }
    }

    /// Create an untyped sequence
    pub fn any(items: Vec<Value>) -> Self {
        Self::new(TypeDesc::Any, items)
    }

    /// Declared element type
    pub fn elem(&self) -> &TypeDesc {
        &self.elem
    }

    /// Elements in order
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Mutable access to the elements
    pub fn items_mut(&mut self) -> &mut Vec<Value> {
        &mut self.items
    }

    /// Take the elements
    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    /// Element at a 0-based index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Key/value mapping with declared key and value types.
///
/// Entries keep insertion order; inserting an equal key replaces its value.
/// Boolean, integer, text and byte keys are indexed; other keys are matched
/// by scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    key: TypeDesc,
    value: TypeDesc,
    entries: Vec<(Value, Value)>,
    slots: HashMap<SlotKey, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SlotKey {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(SlotKey::Bool(*b)),
            Value::Int(i) => Some(SlotKey::Int(*i)),
            Value::Text(s) => Some(SlotKey::Text(s.clone())),
            Value::Bytes(b) => Some(SlotKey::Bytes(b.clone())),
            _ => None,
        }
    }
}

impl Mapping {
    /// Create an empty mapping
    pub fn new(key: TypeDesc, value: TypeDesc) -> Self {
        Self {
            key,
            value,
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Create an empty text-keyed mapping of any values
    pub fn text_keyed() -> Self {
        Self::new(TypeDesc::Text, TypeDesc::Any)
    }

    /// Declared key type
    pub fn key_type(&self) -> &TypeDesc {
        &self.key
    }

    /// Declared value type
    pub fn value_type(&self) -> &TypeDesc {
        &self.value
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, key: Value, value: Value) {
        let slot = match SlotKey::of(&key) {
            Some(id) => match self.slots.get(&id) {
                Some(&index) => Some(index),
                None => {
                    self.slots.insert(id, self.entries.len());
                    None
                }
            },
            None => self.entries.iter().position(|(k, _)| *k == key),
        };
        match slot {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up by key
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match SlotKey::of(key) {
            Some(id) => self.slots.get(&id).map(|&index| &self.entries[index].1),
            None => self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
        }
    }

    /// Look up by text key
    pub fn get_text(&self, key: &str) -> Option<&Value> {
        self.slots
            .get(&SlotKey::Text(key.to_string()))
            .map(|&index| &self.entries[index].1)
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    /// Take the entries
    pub fn into_entries(self) -> Vec<(Value, Value)> {
        self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Value
// ============================================================================

/// A host value
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value
    Nil,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered sequence
    Seq(Sequence),
    /// Mapping
    Map(Mapping),
    /// Shared live message instance
    Message(MessageRef),
    /// Script callable
    Callable(Handle),
    /// Opaque host or script object
    Opaque(Handle),
}

impl Value {
    /// Text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Wrap a message as a new shared instance
    pub fn message(message: Message) -> Self {
        Value::Message(message.into_ref())
    }

    /// Coarse tag
    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Bool(_) => Kind::Boolean,
            Value::Int(_) => Kind::Integer,
            Value::Float(_) => Kind::Float,
            Value::Text(_) => Kind::Text,
            Value::Bytes(_) => Kind::Bytes,
            Value::Seq(_) => Kind::Sequence,
            Value::Map(_) => Kind::Mapping,
            Value::Message(_) => Kind::Message,
            Value::Callable(_) => Kind::Callable,
            Value::Opaque(_) => Kind::Opaque,
        }
    }

    /// Runtime type of the held value
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Value::Nil => TypeDesc::Nil,
            Value::Bool(_) => TypeDesc::Bool,
            Value::Int(_) => TypeDesc::Int,
            Value::Float(_) => TypeDesc::Float,
            Value::Text(_) => TypeDesc::Text,
            Value::Bytes(_) => TypeDesc::Bytes,
            Value::Seq(seq) => TypeDesc::seq(seq.elem.clone()),
            Value::Map(map) => TypeDesc::map(map.key.clone(), map.value.clone()),
            Value::Message(message) => TypeDesc::message(message.lock().full_name()),
            Value::Callable(_) => TypeDesc::Callable,
            Value::Opaque(handle) => match handle.downcast_ref::<crate::context::CallContext>() {
                Some(_) => TypeDesc::Context,
                None => TypeDesc::Opaque(handle.type_name().to_string()),
            },
        }
    }

    /// Check for nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Borrow as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Plain text rendering used when a value is coerced to text.
    pub fn render_text(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Seq(_) | Value::Map(_) | Value::Message(_) => self.to_json().to_string(),
            Value::Callable(_) => "function".to_string(),
            Value::Opaque(handle) => handle.type_name().to_string(),
        }
    }

    /// JSON view; bytes are base64-encoded and mapping keys are rendered
    /// as text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Seq(seq) => serde_json::Value::Array(seq.items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.entries
                    .iter()
                    .map(|(k, v)| (k.render_text(), v.to_json()))
                    .collect(),
            ),
            Value::Message(message) => message.lock().to_json(),
            Value::Callable(_) | Value::Opaque(_) => serde_json::Value::String(self.render_text()),
        }
    }

    /// Whether `target` can be reached from this value through message
    /// fields and container elements.
    pub fn reaches(&self, target: &MessageRef) -> bool {
        self.reaches_from(target, &mut HashSet::new())
    }

    fn reaches_from(&self, target: &MessageRef, seen: &mut HashSet<*const ()>) -> bool {
        match self {
            Value::Message(message) => {
                if Arc::ptr_eq(message, target) {
                    return true;
                }
                if !seen.insert(Arc::as_ptr(message).cast()) {
                    return false;
                }
                let guard = message.lock();
                let found = guard.values().any(|(_, v)| v.reaches_from(target, seen));
                found
            }
            Value::Seq(seq) => seq.items.iter().any(|v| v.reaches_from(target, seen)),
            Value::Map(map) => map
                .entries
                .iter()
                .any(|(k, v)| k.reaches_from(target, seen) || v.reaches_from(target, seen)),
            _ => false,
        }
    }

    /// Copy that shares no message instances with `self`.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Message(message) => Value::message(message.lock().deep_clone()),
            Value::Seq(seq) => Value::Seq(Sequence::new(
                seq.elem.clone(),
                seq.items.iter().map(Value::deep_clone).collect(),
            )),
            Value::Map(map) => Value::Map(Mapping {
                key: map.key.clone(),
                value: map.value.clone(),
                entries: map
                    .entries
                    .iter()
                    .map(|(k, v)| (k.deep_clone(), v.deep_clone()))
                    .collect(),
                slots: map.slots.clone(),
            }),
            other => other.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => {
                Arc::ptr_eq(a, b) || *a.lock() == *b.lock()
            }
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
