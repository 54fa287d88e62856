//! Error types for the host/script boundary

use crate::types::TypeDesc;
use crate::value::Value;

/// Result type for bridged calls
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while adapting, coercing or invoking a bridged function.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Wrong number of arguments; the callable is never invoked
    #[error("argument count mismatch: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// An argument's runtime type is not accepted by its parameter
    #[error("argument {position} should be {expected}, got {actual}")]
    TypeMismatch {
        /// 1-based argument position (0 when not yet known)
        position: usize,
        /// Declared parameter type
        expected: TypeDesc,
        /// Runtime type of the supplied value
        actual: TypeDesc,
    },

    /// An argument could not be coerced to its declared parameter type
    #[error("cannot convert argument {position}: {source}")]
    UnconvertibleType {
        /// 1-based argument position
        position: usize,
        /// Underlying conversion failure
        source: CoercionError,
    },

    /// An RPC call received something other than a context or message
    #[error("argument {position} must be a {expected}")]
    InvalidCallableTarget {
        /// 1-based argument position
        position: usize,
        /// What was required at that position
        expected: &'static str,
    },

    /// A script callback failed while receiving a result
    #[error("callback error: {0}")]
    CallbackInvocationFailure(String),

    /// No message type is registered under this full name
    #[error("invalid message type: {0}")]
    MessageTypeNotRegistered(String),

    /// A field write was rejected and dropped
    #[error("field {field}: {reason}")]
    FieldAccessIgnored {
        /// Field name as written by the script
        field: String,
        /// Why the write was dropped
        reason: String,
    },

    /// The underlying callable returned an error
    #[error("{message}")]
    Host {
        /// Error text reported by the callable
        message: String,
        /// Result produced alongside the error, if any
        partial: Option<Box<Value>>,
    },
}

impl BridgeError {
    /// Build a `Host` error without a partial result
    pub fn host(message: impl Into<String>) -> Self {
        BridgeError::Host {
            message: message.into(),
            partial: None,
        }
    }

    /// Build a `FieldAccessIgnored` error
    pub fn field_ignored(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::FieldAccessIgnored {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Fill in the argument position of a `TypeMismatch` raised by a
    /// conversion that did not know where its value came from.
    pub fn at_position(self, position: usize) -> Self {
        match self {
            BridgeError::TypeMismatch {
                position: 0,
                expected,
                actual,
            } => BridgeError::TypeMismatch {
                position,
                expected,
                actual,
            },
            other => other,
        }
    }

    /// Result produced by the callable before it failed
    pub fn partial(&self) -> Option<&Value> {
        match self {
            BridgeError::Host { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}

impl From<String> for BridgeError {
    fn from(s: String) -> Self {
        BridgeError::host(s)
    }
}

impl From<&str> for BridgeError {
    fn from(s: &str) -> Self {
        BridgeError::host(s)
    }
}

/// Value conversion failures, nested to identify the offending element.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    /// No converter exists between the two types
    #[error("cannot convert {from} to {to}")]
    Unsupported {
        /// Source type
        from: TypeDesc,
        /// Target type
        to: TypeDesc,
    },

    /// A sequence element failed to convert
    #[error("cannot convert sequence element at index {index}: {source}")]
    Element {
        /// 0-based element index
        index: usize,
        /// Element failure
        source: Box<CoercionError>,
    },

    /// A mapping key failed to convert
    #[error("cannot convert map key {key}: {source}")]
    Key {
        /// Rendered key
        key: String,
        /// Key failure
        source: Box<CoercionError>,
    },

    /// A mapping value failed to convert
    #[error("cannot convert map value for key {key}: {source}")]
    Entry {
        /// Rendered key
        key: String,
        /// Value failure
        source: Box<CoercionError>,
    },
}
