//! Signature extraction for typed host functions
//!
//! Any `Fn` of up to eight arguments whose parameters implement `FromValue`
//! and whose return type implements `IntoReturn` is a `HostFn`. The trait
//! exposes the parameter and return descriptors and a uniform call taking
//! already-checked values.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use crate::context::CallContext;
use crate::convert::{ByteBuf, Callable, FromValue, HostType, IntoValue};
use crate::error::{BridgeError, BridgeResult};
use crate::message::MessageRef;
use crate::types::TypeDesc;
use crate::value::Value;

/// Descriptor of a host callable
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Rust type name of the callable, for diagnostics
    pub raw_name: String,
    /// Ordered parameter types
    pub params: Vec<TypeDesc>,
    /// Ordered return types, trailing error excluded
    pub returns: Vec<TypeDesc>,
}

impl Signature {
    /// Describe a host callable
    pub fn of<F, Args>(_f: &F) -> Self
    where
        F: HostFn<Args>,
    {
        Self {
            raw_name: std::any::type_name::<F>().to_string(),
            params: F::params(),
            returns: F::returns(),
        }
    }
}

// ============================================================================
// Return handling
// ============================================================================

/// How a callable's return value maps onto the call contract
pub trait IntoReturn {
    /// Declared return types; error-like returns are left out
    fn returns() -> Vec<TypeDesc>;

    /// Produce the single result or a host error
    fn into_return(self) -> BridgeResult<Value>;
}

fn declared<T: HostType>() -> Vec<TypeDesc> {
    match T::type_desc() {
        TypeDesc::Nil => Vec::new(),
        desc => vec![desc],
    }
}

macro_rules! value_return {
    ($($ty:ty),*) => {
        $(
            impl IntoReturn for $ty {
                fn returns() -> Vec<TypeDesc> {
                    declared::<$ty>()
                }

                fn into_return(self) -> BridgeResult<Value> {
                    Ok(self.into_value())
                }
            }
        )*
    };
}

value_return!(
    (),
    Value,
    bool,
    i64,
    i32,
    u16,
    u32,
    f64,
    String,
    &'static str,
    ByteBuf,
    MessageRef,
    CallContext,
    Callable
);

impl<T: IntoValue> IntoReturn for Vec<T> {
    fn returns() -> Vec<TypeDesc> {
        declared::<Self>()
    }

    fn into_return(self) -> BridgeResult<Value> {
        Ok(self.into_value())
    }
}

impl<T: IntoValue> IntoReturn for HashMap<String, T> {
    fn returns() -> Vec<TypeDesc> {
        declared::<Self>()
    }

    fn into_return(self) -> BridgeResult<Value> {
        Ok(self.into_value())
    }
}

impl<T: IntoValue> IntoReturn for BTreeMap<String, T> {
    fn returns() -> Vec<TypeDesc> {
        declared::<Self>()
    }

    fn into_return(self) -> BridgeResult<Value> {
        Ok(self.into_value())
    }
}

impl<T: IntoValue, E: Display> IntoReturn for Result<T, E> {
    fn returns() -> Vec<TypeDesc> {
        declared::<T>()
    }

    fn into_return(self) -> BridgeResult<Value> {
        self.map(IntoValue::into_value)
            .map_err(|err| BridgeError::host(err.to_string()))
    }
}

/// A result produced together with an optional error. The error wins, but
/// the value still travels with it as the partial result.
impl<T: IntoValue, E: Display> IntoReturn for (T, Option<E>) {
    fn returns() -> Vec<TypeDesc> {
        declared::<T>()
    }

    fn into_return(self) -> BridgeResult<Value> {
        let (value, err) = self;
        match err {
            None => Ok(value.into_value()),
            Some(err) => Err(BridgeError::Host {
                message: err.to_string(),
                partial: Some(Box::new(value.into_value())),
            }),
        }
    }
}

// ============================================================================
// Host functions
// ============================================================================

/// A typed host callable with a uniform call entry.
pub trait HostFn<Args>: Send + Sync + 'static {
    /// Ordered parameter types
    fn params() -> Vec<TypeDesc>;

    /// Ordered return types
    fn returns() -> Vec<TypeDesc>;

    /// Invoke with positional values. Arity and types are checked by the
    /// caller; a value of the wrong shape still fails with `TypeMismatch`.
    fn call(&self, args: Vec<Value>) -> BridgeResult<Value>;
}

macro_rules! impl_host_fn {
    ($($ty:ident : $var:ident),*) => {
        impl<Func, Ret, $($ty,)*> HostFn<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret + Send + Sync + 'static,
            Ret: IntoReturn,
            $($ty: FromValue,)*
        {
            fn params() -> Vec<TypeDesc> {
                vec![$(<$ty as HostType>::type_desc()),*]
            }

            fn returns() -> Vec<TypeDesc> {
                Ret::returns()
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn call(&self, args: Vec<Value>) -> BridgeResult<Value> {
                let mut args = args.into_iter();
                let mut position = 0usize;
                $(
                    position += 1;
                    let $var = <$ty as FromValue>::from_value(args.next().unwrap_or(Value::Nil))
                        .map_err(|err| err.at_position(position))?;
                )*
                (self)($($var),*).into_return()
            }
        }
    };
}

impl_host_fn!();
impl_host_fn!(A1: a1);
impl_host_fn!(A1: a1, A2: a2);
impl_host_fn!(A1: a1, A2: a2, A3: a3);
impl_host_fn!(A1: a1, A2: a2, A3: a3, A4: a4);
impl_host_fn!(A1: a1, A2: a2, A3: a3, A4: a4, A5: a5);
impl_host_fn!(A1: a1, A2: a2, A3: a3, A4: a4, A5: a5, A6: a6);
impl_host_fn!(A1: a1, A2: a2, A3: a3, A4: a4, A5: a5, A6: a6, A7: a7);
impl_host_fn!(A1: a1, A2: a2, A3: a3, A4: a4, A5: a5, A6: a6, A7: a7, A8: a8);

#[cfg(test)]
mod tests {
    use super::*;

    fn add(a: i64, b: i64) -> i64 {
        a + b
    }

    fn parse(text: String) -> Result<i64, std::num::ParseIntError> {
        text.parse()
    }

    fn partial(n: i64) -> (i64, Option<String>) {
        (n, Some("warned".to_string()))
    }

    fn nothing() {}

    #[test]
    fn test_plain_function() {
        let sig = Signature::of(&add);
        assert_eq!(sig.params, vec![TypeDesc::Int, TypeDesc::Int]);
        assert_eq!(sig.returns, vec![TypeDesc::Int]);
        assert!(sig.raw_name.ends_with("add"));
    }

    #[test]
    fn test_error_return_dropped() {
        let sig = Signature::of(&parse);
        assert_eq!(sig.params, vec![TypeDesc::Text]);
        assert_eq!(sig.returns, vec![TypeDesc::Int]);
        assert_eq!(HostFn::call(&parse, vec![Value::text("12")]).unwrap(), Value::Int(12));
        assert!(HostFn::call(&parse, vec![Value::text("x")]).is_err());
    }

    #[test]
    fn test_unit_return_has_no_returns() {
        assert!(Signature::of(&nothing).returns.is_empty());
        assert!(Signature::of(&nothing).params.is_empty());
        let sig = Signature::of(&|_: String| -> Result<(), String> { Ok(()) });
        assert!(sig.returns.is_empty());
    }

    #[test]
    fn test_partial_result_travels_with_error() {
        let err = HostFn::call(&partial, vec![Value::Int(5)]).unwrap_err();
        assert_eq!(err.to_string(), "warned");
        assert_eq!(err.partial(), Some(&Value::Int(5)));
    }

    #[test]
    fn test_call_reports_position() {
        let err = HostFn::call(&add, vec![Value::Int(1), Value::text("2")]).unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { position: 2, .. }));
    }

    #[test]
    fn test_closure_signature() {
        let f = |names: Vec<String>, sep: String| names.join(sep.as_str());
        let sig = Signature::of(&f);
        assert_eq!(sig.params, vec![TypeDesc::seq(TypeDesc::Text), TypeDesc::Text]);
        assert_eq!(sig.returns, vec![TypeDesc::Text]);
    }
}
