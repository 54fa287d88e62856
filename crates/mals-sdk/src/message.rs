//! Structured messages: descriptors, instances, registry and rendering
//!
//! A message type is a full name plus an ordered, fixed field set. Fields
//! are addressed by exact, case-sensitive name. Instances are shared live
//! through `MessageRef`; creating a new instance always deep-copies a
//! template, so independently created messages never alias.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::coerce::Coercer;
use crate::error::{BridgeError, BridgeResult};
use crate::types::TypeDesc;
use crate::value::{Mapping, Sequence, Value};

/// Shared live message instance
pub type MessageRef = Arc<Mutex<Message>>;

/// Default text/bytes length kept by `render`
pub const DEFAULT_TRUNCATE_LIMIT: usize = 1024;

/// Default suffix appended to truncated fields
pub const DEFAULT_TRUNCATE_MARKER: &str = "......";

// ============================================================================
// Descriptors
// ============================================================================

/// One field of a message type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    name: String,
    ty: TypeDesc,
    writable: bool,
}

impl FieldDescriptor {
    /// Writable field
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            writable: true,
        }
    }

    /// Field scripts may read but not write
    pub fn read_only(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            writable: false,
            ..Self::new(name, ty)
        }
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type
    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }

    /// Whether scripts may assign the field
    pub fn writable(&self) -> bool {
        self.writable
    }
}

/// A message type: full name and ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDescriptor {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl MessageDescriptor {
    /// Describe a message type. A later field with a duplicate name
    /// replaces the earlier one.
    pub fn new(full_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let mut unique: Vec<FieldDescriptor> = Vec::with_capacity(fields.len());
        let mut index = HashMap::new();
        for field in fields {
            match index.get(field.name()) {
                Some(&i) => unique[i] = field,
                None => {
                    index.insert(field.name().to_string(), unique.len());
                    unique.push(field);
                }
            }
        }
        Self {
            full_name: full_name.into(),
            fields: unique,
            index,
        }
    }

    /// Full name, e.g. `demo.Ping`
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Name with the package prefix removed
    pub fn short_name(&self) -> &str {
        short_name(&self.full_name)
    }

    /// Package prefix, empty when the name has no dot
    pub fn package(&self) -> &str {
        self.full_name
            .split_once('.')
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field and its slot
    pub fn field(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.index.get(name).map(|&i| (i, &self.fields[i]))
    }
}

/// Strip everything up to and including the first dot
pub fn short_name(full_name: &str) -> &str {
    full_name
        .split_once('.')
        .map(|(_, rest)| rest)
        .unwrap_or(full_name)
}

/// Zero value of a field type
pub fn zero_value(ty: &TypeDesc) -> Value {
    match ty {
        TypeDesc::Bool => Value::Bool(false),
        TypeDesc::Int => Value::Int(0),
        TypeDesc::Float => Value::Float(0.0),
        TypeDesc::Text => Value::Text(String::new()),
        TypeDesc::Bytes => Value::Bytes(Vec::new()),
        TypeDesc::Seq(elem) => Value::Seq(Sequence::new((**elem).clone(), Vec::new())),
        TypeDesc::Map(key, value) => Value::Map(Mapping::new((**key).clone(), (**value).clone())),
        _ => Value::Nil,
    }
}

// ============================================================================
// Render options
// ============================================================================

/// Truncation applied when rendering messages as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Maximum characters (text) or bytes (bytes) kept per field
    pub limit: usize,
    /// Suffix appended after truncation
    pub marker: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TRUNCATE_LIMIT,
            marker: DEFAULT_TRUNCATE_MARKER.to_string(),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// An instance of a message type
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    descriptor: Arc<MessageDescriptor>,
    values: Vec<Value>,
}

impl Message {
    /// Instance with every field at its zero value
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        let values = descriptor.fields().iter().map(|f| zero_value(f.ty())).collect();
        Self { descriptor, values }
    }

    /// Share this instance
    pub fn into_ref(self) -> MessageRef {
        Arc::new(Mutex::new(self))
    }

    /// Type descriptor
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Full type name
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    /// Read a field; `None` when no such field exists
    pub fn get(&self, name: &str) -> Option<Value> {
        self.descriptor
            .field(name)
            .and_then(|(i, _)| self.values.get(i).cloned())
    }

    /// Store a value without any checks. Returns false for unknown fields.
    pub fn set_raw(&mut self, name: &str, value: Value) -> bool {
        match self.descriptor.field(name) {
            Some((i, _)) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Field values in declaration order
    pub fn values(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.descriptor.fields().iter().zip(&self.values)
    }

    /// Assign a field with script write semantics.
    ///
    /// Text written to a bytes field is taken as its bytes. A sequence
    /// written to a text-list field must hold only text. `Nil` clears a
    /// message field. Anything else must be accepted by the field type or
    /// have a converter. On error the field keeps its old value.
    pub fn assign(&mut self, name: &str, value: Value, coercer: &Coercer) -> BridgeResult<()> {
        let (index, field) = self
            .descriptor
            .field(name)
            .ok_or_else(|| BridgeError::field_ignored(name, "invalid field"))?;
        if !field.writable() {
            return Err(BridgeError::field_ignored(name, "field is read-only"));
        }

        let value = match (field.ty(), value) {
            (TypeDesc::Bytes, Value::Text(s)) => Value::Bytes(s.into_bytes()),
            (TypeDesc::Seq(elem), Value::Seq(seq))
                if **elem == TypeDesc::Text && *seq.elem() != TypeDesc::Text =>
            {
                let mut strings = Vec::with_capacity(seq.len());
                for (i, item) in seq.into_items().into_iter().enumerate() {
                    match item {
                        Value::Text(s) => strings.push(Value::Text(s)),
                        _ => {
                            return Err(BridgeError::field_ignored(
                                name,
                                format!("element {i} is not a string"),
                            ))
                        }
                    }
                }
                Value::Seq(Sequence::new(TypeDesc::Text, strings))
            }
            (TypeDesc::Message(_), Value::Nil) => Value::Nil,
            (ty, value) => {
                let actual = value.type_desc();
                coercer.convert(value, ty).map_err(|_| {
                    BridgeError::field_ignored(name, format!("cannot convert {actual} to {ty}"))
                })?
            }
        };
        self.values[index] = value;
        Ok(())
    }

    /// Copy sharing no nested message instances with `self`
    pub fn deep_clone(&self) -> Message {
        Message {
            descriptor: Arc::clone(&self.descriptor),
            values: self.values.iter().map(Value::deep_clone).collect(),
        }
    }

    /// Shorten long text and bytes fields, recursing into nested messages
    /// and sequences of messages. Meant for a deep clone: nested instances
    /// are modified in place.
    pub fn truncate(&mut self, options: &RenderOptions) {
        for value in &mut self.values {
            truncate_value(value, options);
        }
    }

    /// JSON object of the fields, keys sorted
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values()
                .map(|(field, value)| (field.name().to_string(), value.to_json()))
                .collect(),
        )
    }

    /// `<Message: full.Name> ` followed by indented JSON of a truncated
    /// copy. `self` is left untouched.
    pub fn render(&self, options: &RenderOptions) -> String {
        let mut copy = self.deep_clone();
        copy.truncate(options);
        let body = serde_json::to_string_pretty(&copy.to_json())
            .unwrap_or_else(|err| format!("Error: {err}"));
        format!("<Message: {}> {}", self.full_name(), body)
    }
}

fn truncate_value(value: &mut Value, options: &RenderOptions) {
    match value {
        Value::Text(s) => {
            if s.chars().count() > options.limit {
                let mut cut: String = s.chars().take(options.limit).collect();
                cut.push_str(&options.marker);
                *s = cut;
            }
        }
        Value::Bytes(b) => {
            if b.len() > options.limit {
                b.truncate(options.limit);
                b.extend_from_slice(options.marker.as_bytes());
            }
        }
        Value::Message(message) => message.lock().truncate(options),
        Value::Seq(seq) => {
            for item in seq.items_mut() {
                if let Value::Message(message) = item {
                    message.lock().truncate(options);
                }
            }
        }
        _ => {}
    }
}

// ============================================================================
// Registry
// ============================================================================

/// A registered message type with its zero-value template
#[derive(Debug)]
pub struct MessageType {
    descriptor: Arc<MessageDescriptor>,
    template: Message,
}

impl MessageType {
    /// Type descriptor
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Fresh instance cloned from the template
    pub fn instantiate(&self) -> Message {
        self.template.deep_clone()
    }
}

/// Message types discoverable by full name
#[derive(Debug, Default)]
pub struct MessageRegistry {
    types: BTreeMap<String, MessageType>,
}

impl MessageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type with an all-zero template
    pub fn register(&mut self, descriptor: MessageDescriptor) -> Arc<MessageDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.register_template(Message::new(Arc::clone(&descriptor)));
        descriptor
    }

    /// Register a type using `template` as its initial instance
    pub fn register_template(&mut self, template: Message) {
        let descriptor = Arc::clone(template.descriptor());
        self.types.insert(
            descriptor.full_name().to_string(),
            MessageType {
                descriptor,
                template,
            },
        );
    }

    /// Look up a type
    pub fn get(&self, full_name: &str) -> Option<&MessageType> {
        self.types.get(full_name)
    }

    /// Fresh instance of a registered type
    pub fn instantiate(&self, full_name: &str) -> BridgeResult<Message> {
        self.get(full_name)
            .map(MessageType::instantiate)
            .ok_or_else(|| BridgeError::MessageTypeNotRegistered(full_name.to_string()))
    }

    /// Types named exactly `package.Name`, in name order
    pub fn package_types<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a MessageType> + 'a {
        self.types.values().filter(move |ty| {
            let mut parts = ty.descriptor.full_name().split('.');
            matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(p), Some(_), None) if p == package
            )
        })
    }

    /// Distinct package prefixes
    pub fn packages(&self) -> Vec<String> {
        self.types
            .values()
            .map(|ty| ty.descriptor.package())
            .filter(|p| !p.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// All types, in name order
    pub fn iter(&self) -> impl Iterator<Item = &MessageType> {
        self.types.values()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MessageRegistry {
        let mut registry = MessageRegistry::new();
        registry.register(MessageDescriptor::new(
            "demo.Inner",
            vec![FieldDescriptor::new("Note", TypeDesc::Text)],
        ));
        registry.register(MessageDescriptor::new(
            "demo.Task",
            vec![
                FieldDescriptor::read_only("Id", TypeDesc::Int),
                FieldDescriptor::new("Name", TypeDesc::Text),
                FieldDescriptor::new("Data", TypeDesc::Bytes),
                FieldDescriptor::new("Tags", TypeDesc::seq(TypeDesc::Text)),
                FieldDescriptor::new("Ratio", TypeDesc::Float),
                FieldDescriptor::new("Inner", TypeDesc::message("demo.Inner")),
                FieldDescriptor::new("Items", TypeDesc::seq(TypeDesc::message("demo.Inner"))),
            ],
        ));
        registry.register(MessageDescriptor::new("demo.sub.Deep", vec![]));
        registry
    }

    #[test]
    fn test_zero_template() {
        let task = registry().instantiate("demo.Task").unwrap();
        assert_eq!(task.get("Id"), Some(Value::Int(0)));
        assert_eq!(task.get("Name"), Some(Value::text("")));
        assert_eq!(task.get("Inner"), Some(Value::Nil));
        assert_eq!(task.get("name"), None);
    }

    #[test]
    fn test_instances_never_alias() {
        let mut registry = MessageRegistry::new();
        let descriptor = Arc::new(MessageDescriptor::new(
            "demo.Outer",
            vec![FieldDescriptor::new("Inner", TypeDesc::message("demo.Inner"))],
        ));
        let inner = Message::new(Arc::new(MessageDescriptor::new(
            "demo.Inner",
            vec![FieldDescriptor::new("Note", TypeDesc::Text)],
        )));
        let mut template = Message::new(descriptor);
        template.set_raw("Inner", Value::message(inner));
        registry.register_template(template);

        let a = registry.instantiate("demo.Outer").unwrap();
        let b = registry.instantiate("demo.Outer").unwrap();
        if let Some(Value::Message(inner)) = a.get("Inner") {
            inner.lock().set_raw("Note", Value::text("changed"));
        }
        match b.get("Inner") {
            Some(Value::Message(inner)) => {
                assert_eq!(inner.lock().get("Note"), Some(Value::text("")))
            }
            other => panic!("expected nested message, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type() {
        let err = registry().instantiate("demo.Nope").unwrap_err();
        assert_eq!(err.to_string(), "invalid message type: demo.Nope");
    }

    #[test]
    fn test_assign_rules() {
        let coercer = Coercer::default();
        let mut task = registry().instantiate("demo.Task").unwrap();

        task.assign("Name", Value::text("scan"), &coercer).unwrap();
        task.assign("Data", Value::text("raw"), &coercer).unwrap();
        task.assign("Ratio", Value::Int(3), &coercer).unwrap();
        task.assign(
            "Tags",
            Value::Seq(Sequence::any(vec![Value::text("a"), Value::text("b")])),
            &coercer,
        )
        .unwrap();

        assert_eq!(task.get("Name"), Some(Value::text("scan")));
        assert_eq!(task.get("Data"), Some(Value::Bytes(b"raw".to_vec())));
        assert_eq!(task.get("Ratio"), Some(Value::Float(3.0)));
        assert_eq!(
            task.get("Tags").unwrap().type_desc(),
            TypeDesc::seq(TypeDesc::Text)
        );
    }

    #[test]
    fn test_rejected_writes_leave_fields_unchanged() {
        let coercer = Coercer::default();
        let mut task = registry().instantiate("demo.Task").unwrap();
        task.assign("Name", Value::text("keep"), &coercer).unwrap();
        let before = task.clone();

        let err = task.assign("Missing", Value::Int(1), &coercer).unwrap_err();
        assert!(matches!(err, BridgeError::FieldAccessIgnored { .. }));
        assert!(task.assign("Id", Value::Int(9), &coercer).is_err());
        assert!(task.assign("Name", Value::Bool(true), &coercer).is_err());
        assert!(task
            .assign(
                "Tags",
                Value::Seq(Sequence::any(vec![Value::text("a"), Value::Int(2)])),
                &coercer,
            )
            .is_err());

        assert_eq!(task, before);
    }

    #[test]
    fn test_nil_clears_message_field() {
        let coercer = Coercer::default();
        let registry = registry();
        let mut task = registry.instantiate("demo.Task").unwrap();
        let inner = registry.instantiate("demo.Inner").unwrap();
        task.assign("Inner", Value::message(inner), &coercer).unwrap();
        assert!(matches!(task.get("Inner"), Some(Value::Message(_))));
        task.assign("Inner", Value::Nil, &coercer).unwrap();
        assert_eq!(task.get("Inner"), Some(Value::Nil));
    }

    #[test]
    fn test_render_truncates_copy_only() {
        let coercer = Coercer::default();
        let registry = registry();
        let mut task = registry.instantiate("demo.Task").unwrap();
        task.assign("Name", Value::text("x".repeat(2000)), &coercer).unwrap();
        task.assign("Data", Value::Bytes(vec![b'z'; 1500]), &coercer).unwrap();

        let rendered = task.render(&RenderOptions::default());
        assert!(rendered.starts_with("<Message: demo.Task> {"));
        let expected = format!("\"{}......\"", "x".repeat(1024));
        assert!(rendered.contains(&expected));
        assert!(!rendered.contains(&"x".repeat(1025)));

        match task.get("Name") {
            Some(Value::Text(s)) => assert_eq!(s.len(), 2000),
            other => panic!("expected text, got {other:?}"),
        }
        match task.get("Data") {
            Some(Value::Bytes(b)) => assert_eq!(b.len(), 1500),
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[test]
    fn test_render_recurses_into_nested_messages() {
        let coercer = Coercer::default();
        let registry = registry();
        let mut inner = registry.instantiate("demo.Inner").unwrap();
        inner.assign("Note", Value::text("n".repeat(20)), &coercer).unwrap();
        let inner = inner.into_ref();

        let mut task = registry.instantiate("demo.Task").unwrap();
        task.set_raw("Inner", Value::Message(Arc::clone(&inner)));
        task.set_raw(
            "Items",
            Value::Seq(Sequence::new(
                TypeDesc::message("demo.Inner"),
                vec![Value::Message(Arc::clone(&inner))],
            )),
        );

        let options = RenderOptions {
            limit: 4,
            marker: "~".into(),
        };
        let rendered = task.render(&options);
        assert!(rendered.contains("\"nnnn~\""));
        assert!(!rendered.contains("nnnnn"));
        assert_eq!(inner.lock().get("Note"), Some(Value::text("n".repeat(20))));
    }

    #[test]
    fn test_render_is_idempotent() {
        let coercer = Coercer::default();
        let mut task = registry().instantiate("demo.Task").unwrap();
        task.assign("Name", Value::text("y".repeat(3000)), &coercer).unwrap();
        let options = RenderOptions::default();
        assert_eq!(task.render(&options), task.render(&options));
    }

    #[test]
    fn test_package_types_two_segments_only() {
        let registry = registry();
        let names: Vec<_> = registry
            .package_types("demo")
            .map(|ty| ty.descriptor().short_name().to_string())
            .collect();
        assert_eq!(names, vec!["Inner", "Task"]);
        assert_eq!(registry.packages(), vec!["demo"]);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("demo.Task"), "Task");
        assert_eq!(short_name("Task"), "Task");
        assert_eq!(short_name("a.b.C"), "b.C");
    }
}
