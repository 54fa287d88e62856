//! Traits for converting between host values and Rust types.
//!
//! `HostType` describes a Rust type at the boundary, `FromValue` extracts
//! it from a `Value` that has already passed the adapter's type check, and
//! `IntoValue` turns a result back into a `Value`. Functions whose argument
//! and return types implement these can be wrapped with
//! `BridgedFunction::wrap`.
//!
//! # Example
//!
//! ```ignore
//! use mals_sdk::{ByteBuf, FromValue, HostType, IntoValue, TypeDesc, Value, BridgeResult};
//!
//! struct Port(u16);
//!
//! impl HostType for Port {
//!     fn type_desc() -> TypeDesc { TypeDesc::Int }
//! }
//!
//! impl FromValue for Port {
//!     fn from_value(value: Value) -> BridgeResult<Self> {
//!         let raw = i64::from_value(value)?;
//!         u16::try_from(raw).map(Port).map_err(|e| e.to_string().into())
//!     }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::context::CallContext;
use crate::error::{BridgeError, BridgeResult};
use crate::message::MessageRef;
use crate::types::TypeDesc;
use crate::value::{Handle, Mapping, Sequence, Value};

/// Describes a Rust type at the boundary
pub trait HostType {
    /// Descriptor used for parameter checks and documentation
    fn type_desc() -> TypeDesc;
}

/// Extract a Rust value from a host value
pub trait FromValue: HostType + Sized {
    /// Convert, failing with `TypeMismatch` (position 0) on the wrong shape
    fn from_value(value: Value) -> BridgeResult<Self>;
}

/// Turn a Rust value into a host value
pub trait IntoValue: HostType {
    /// Convert into a `Value`
    fn into_value(self) -> Value;
}

fn mismatch<T: HostType>(value: &Value) -> BridgeError {
    BridgeError::TypeMismatch {
        position: 0,
        expected: T::type_desc(),
        actual: value.type_desc(),
    }
}

/// Raw bytes, distinct from a sequence of integers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteBuf(pub Vec<u8>);

/// A script callable received as an argument
#[derive(Debug, Clone, PartialEq)]
pub struct Callable(pub Handle);

// ============================================================================
// Value (passthrough)
// ============================================================================

impl HostType for Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> BridgeResult<Self> {
        Ok(value)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

// ============================================================================
// Primitives
// ============================================================================

impl HostType for () {
    fn type_desc() -> TypeDesc {
        TypeDesc::Nil
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Nil
    }
}

impl HostType for bool {
    fn type_desc() -> TypeDesc {
        TypeDesc::Bool
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl HostType for i64 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Int
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

macro_rules! narrow_int {
    ($($ty:ty),*) => {
        $(
            impl HostType for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::Int
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> BridgeResult<Self> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| {
                            BridgeError::host(format!(
                                "integer {} out of range for {}",
                                i,
                                stringify!($ty)
                            ))
                        }),
                        other => Err(mismatch::<Self>(&other)),
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(self as i64)
                }
            }
        )*
    };
}

narrow_int!(i32, u16, u32);

impl HostType for f64 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Float
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl HostType for String {
    fn type_desc() -> TypeDesc {
        TypeDesc::Text
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl HostType for &str {
    fn type_desc() -> TypeDesc {
        TypeDesc::Text
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl HostType for ByteBuf {
    fn type_desc() -> TypeDesc {
        TypeDesc::Bytes
    }
}

impl FromValue for ByteBuf {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Bytes(b) => Ok(ByteBuf(b)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoValue for ByteBuf {
    fn into_value(self) -> Value {
        Value::Bytes(self.0)
    }
}

// ============================================================================
// Containers
// ============================================================================

impl<T: HostType> HostType for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::seq(T::type_desc())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Seq(seq) => seq.into_items().into_iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Seq(Sequence::new(
            T::type_desc(),
            self.into_iter().map(IntoValue::into_value).collect(),
        ))
    }
}

fn text_entries<T: FromValue>(value: Value, expected: TypeDesc) -> BridgeResult<Vec<(String, T)>> {
    match value {
        Value::Map(map) => map
            .into_entries()
            .into_iter()
            .map(|(k, v)| match k {
                Value::Text(key) => Ok((key, T::from_value(v)?)),
                other => Err(BridgeError::TypeMismatch {
                    position: 0,
                    expected: expected.clone(),
                    actual: other.type_desc(),
                }),
            })
            .collect(),
        other => Err(BridgeError::TypeMismatch {
            position: 0,
            expected,
            actual: other.type_desc(),
        }),
    }
}

fn text_mapping<T: IntoValue>(entries: impl Iterator<Item = (String, T)>) -> Value {
    let mut map = Mapping::new(TypeDesc::Text, T::type_desc());
    for (k, v) in entries {
        map.insert(Value::Text(k), v.into_value());
    }
    Value::Map(map)
}

impl<T: HostType> HostType for HashMap<String, T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(TypeDesc::Text, T::type_desc())
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> BridgeResult<Self> {
        Ok(text_entries(value, Self::type_desc())?.into_iter().collect())
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn into_value(self) -> Value {
        text_mapping(self.into_iter())
    }
}

impl<T: HostType> HostType for BTreeMap<String, T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(TypeDesc::Text, T::type_desc())
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> BridgeResult<Self> {
        Ok(text_entries(value, Self::type_desc())?.into_iter().collect())
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        text_mapping(self.into_iter())
    }
}

// ============================================================================
// Messages, contexts, callables
// ============================================================================

impl HostType for MessageRef {
    fn type_desc() -> TypeDesc {
        TypeDesc::Message(None)
    }
}

impl FromValue for MessageRef {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Message(message) => Ok(message),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoValue for MessageRef {
    fn into_value(self) -> Value {
        Value::Message(self)
    }
}

impl HostType for CallContext {
    fn type_desc() -> TypeDesc {
        TypeDesc::Context
    }
}

impl FromValue for CallContext {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match &value {
            Value::Opaque(handle) => match handle.downcast_ref::<CallContext>() {
                Some(ctx) => Ok(ctx.clone()),
                None => Err(mismatch::<Self>(&value)),
            },
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl IntoValue for CallContext {
    fn into_value(self) -> Value {
        Value::Opaque(Handle::new(self))
    }
}

impl HostType for Callable {
    fn type_desc() -> TypeDesc {
        TypeDesc::Callable
    }
}

impl FromValue for Callable {
    fn from_value(value: Value) -> BridgeResult<Self> {
        match value {
            Value::Callable(handle) => Ok(Callable(handle)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoValue for Callable {
    fn into_value(self) -> Value {
        Value::Callable(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_round_trip() {
        assert_eq!(i64::from_value(7_i64.into_value()).unwrap(), 7);
        assert_eq!(String::from_value("x".into_value()).unwrap(), "x");
        assert!(bool::from_value(Value::Bool(true)).unwrap());
    }

    #[test]
    fn test_mismatch_has_unknown_position() {
        let err = i64::from_value(Value::text("1")).unwrap_err();
        match err {
            BridgeError::TypeMismatch {
                position,
                expected,
                actual,
            } => {
                assert_eq!(position, 0);
                assert_eq!(expected, TypeDesc::Int);
                assert_eq!(actual, TypeDesc::Text);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_narrow_int_range() {
        assert_eq!(u16::from_value(Value::Int(80)).unwrap(), 80);
        let err = u16::from_value(Value::Int(70_000)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_vec_descriptor_and_values() {
        assert_eq!(Vec::<String>::type_desc(), TypeDesc::seq(TypeDesc::Text));
        let value = vec!["a".to_string(), "b".to_string()].into_value();
        assert_eq!(value.type_desc(), TypeDesc::seq(TypeDesc::Text));
        let back = Vec::<String>::from_value(value).unwrap();
        assert_eq!(back, vec!["a", "b"]);
    }

    #[test]
    fn test_map_requires_text_keys() {
        let mut map = Mapping::new(TypeDesc::Any, TypeDesc::Any);
        map.insert(Value::Int(1), Value::Int(2));
        assert!(HashMap::<String, i64>::from_value(Value::Map(map)).is_err());

        let mut map = Mapping::text_keyed();
        map.insert(Value::text("k"), Value::Int(2));
        let parsed = BTreeMap::<String, i64>::from_value(Value::Map(map)).unwrap();
        assert_eq!(parsed.get("k"), Some(&2));
    }

    #[test]
    fn test_context_through_opaque() {
        let ctx = CallContext::background();
        let value = ctx.clone().into_value();
        assert_eq!(value.type_desc(), TypeDesc::Context);
        let back = CallContext::from_value(value).unwrap();
        back.cancel();
        assert!(ctx.is_cancelled());
    }
}
