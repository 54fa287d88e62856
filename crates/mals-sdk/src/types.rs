//! Type descriptors for host values
//!
//! `TypeDesc` stands in for the host's static types at the boundary: every
//! bridged parameter and return is described by one, and every `Value`
//! reports the descriptor of what it currently holds. `Kind` is the coarse
//! tag used to key the converter table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse tag of a runtime value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Absent value
    Nil,
    /// `true` / `false`
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// UTF-8 text
    Text,
    /// Raw bytes
    Bytes,
    /// Ordered sequence
    Sequence,
    /// Key/value mapping
    Mapping,
    /// Structured message
    Message,
    /// Script callable
    Callable,
    /// Anything the bridge only passes through
    Opaque,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Nil => "nil",
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Text => "text",
            Kind::Bytes => "bytes",
            Kind::Sequence => "sequence",
            Kind::Mapping => "mapping",
            Kind::Message => "message",
            Kind::Callable => "callable",
            Kind::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Host type handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDesc {
    /// Accepts every value
    Any,
    /// Only nil
    Nil,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// Text
    Text,
    /// Raw bytes
    Bytes,
    /// Sequence with an element type
    Seq(Box<TypeDesc>),
    /// Mapping with key and value types
    Map(Box<TypeDesc>, Box<TypeDesc>),
    /// Message of the given full name, or any message when `None`
    Message(Option<String>),
    /// Script callable
    Callable,
    /// Call context (deadline and cancellation)
    Context,
    /// Named opaque host type
    Opaque(String),
    /// Named interface, used for return markers
    Interface(String),
}

impl TypeDesc {
    /// Sequence of `elem`
    pub fn seq(elem: TypeDesc) -> Self {
        TypeDesc::Seq(Box::new(elem))
    }

    /// Mapping from `key` to `value`
    pub fn map(key: TypeDesc, value: TypeDesc) -> Self {
        TypeDesc::Map(Box::new(key), Box::new(value))
    }

    /// Message with the given full name
    pub fn message(full_name: impl Into<String>) -> Self {
        TypeDesc::Message(Some(full_name.into()))
    }

    /// Whether a value of runtime type `actual` can be passed as `self`
    /// without conversion.
    pub fn accepts(&self, actual: &TypeDesc) -> bool {
        match (self, actual) {
            (TypeDesc::Any, _) => true,
            (TypeDesc::Message(None), TypeDesc::Message(_)) => true,
            (expected, actual) => expected == actual,
        }
    }

    /// Converter-table key for this type
    pub fn kind(&self) -> Kind {
        match self {
            TypeDesc::Nil => Kind::Nil,
            TypeDesc::Bool => Kind::Boolean,
            TypeDesc::Int => Kind::Integer,
            TypeDesc::Float => Kind::Float,
            TypeDesc::Text => Kind::Text,
            TypeDesc::Bytes => Kind::Bytes,
            TypeDesc::Seq(_) => Kind::Sequence,
            TypeDesc::Map(_, _) => Kind::Mapping,
            TypeDesc::Message(_) => Kind::Message,
            TypeDesc::Callable => Kind::Callable,
            TypeDesc::Any | TypeDesc::Context | TypeDesc::Opaque(_) | TypeDesc::Interface(_) => {
                Kind::Opaque
            }
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Any => f.write_str("any"),
            TypeDesc::Nil => f.write_str("nil"),
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Int => f.write_str("int"),
            TypeDesc::Float => f.write_str("float"),
            TypeDesc::Text => f.write_str("string"),
            TypeDesc::Bytes => f.write_str("bytes"),
            TypeDesc::Seq(elem) => write!(f, "[]{elem}"),
            TypeDesc::Map(key, value) => write!(f, "map[{key}]{value}"),
            TypeDesc::Message(None) => f.write_str("message"),
            TypeDesc::Message(Some(name)) => write!(f, "message<{name}>"),
            TypeDesc::Callable => f.write_str("function"),
            TypeDesc::Context => f.write_str("context"),
            TypeDesc::Opaque(name) => f.write_str(name),
            TypeDesc::Interface(name) => write!(f, "interface {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        assert!(TypeDesc::Any.accepts(&TypeDesc::Text));
        assert!(TypeDesc::Int.accepts(&TypeDesc::Int));
        assert!(!TypeDesc::Int.accepts(&TypeDesc::Float));
        assert!(TypeDesc::Message(None).accepts(&TypeDesc::message("demo.Ping")));
        assert!(!TypeDesc::message("demo.Pong").accepts(&TypeDesc::message("demo.Ping")));
        assert!(!TypeDesc::seq(TypeDesc::Text).accepts(&TypeDesc::seq(TypeDesc::Any)));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeDesc::seq(TypeDesc::Text).to_string(), "[]string");
        assert_eq!(
            TypeDesc::map(TypeDesc::Text, TypeDesc::Int).to_string(),
            "map[string]int"
        );
        assert_eq!(TypeDesc::message("demo.Ping").to_string(), "message<demo.Ping>");
    }

    #[test]
    fn test_kind() {
        assert_eq!(TypeDesc::seq(TypeDesc::Int).kind(), Kind::Sequence);
        assert_eq!(TypeDesc::Context.kind(), Kind::Opaque);
        assert_eq!(Kind::Integer.to_string(), "integer");
    }
}
