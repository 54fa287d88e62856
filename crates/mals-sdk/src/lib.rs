//! mals SDK - host-side half of the script bridge
//!
//! This crate holds everything that does not depend on a particular
//! scripting runtime: the value model, typed function adapters, the
//! coercion pipeline, RPC harvesting and structured messages.
//!
//! # Example
//!
//! ```ignore
//! use mals_sdk::{FunctionRegistry, Value};
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("math", "add", |a: i64, b: i64| a + b);
//!
//! let add = registry.get("math.add").unwrap();
//! assert_eq!(add.invoke(vec![Value::Int(1), Value::Int(2)])?, Value::Int(3));
//! ```

#![warn(missing_docs)]

pub mod coerce;
pub mod context;
pub mod convert;
pub mod error;
pub mod function;
pub mod message;
pub mod metadata;
pub mod registry;
pub mod rpc;
pub mod signature;
pub mod types;
pub mod value;

pub use coerce::{Coercer, Converter, ConverterTable};
pub use context::CallContext;
pub use convert::{ByteBuf, Callable, FromValue, HostType, IntoValue};
pub use error::{BridgeError, BridgeResult, CoercionError};
pub use function::{parse_pairs, BridgedFunction, Entry, Help};
pub use message::{
    short_name, FieldDescriptor, Message, MessageDescriptor, MessageRef, MessageRegistry,
    MessageType, RenderOptions, DEFAULT_TRUNCATE_LIMIT, DEFAULT_TRUNCATE_MARKER,
};
pub use metadata::{FunctionMetadata, HelpMetadata, HelpPair};
pub use registry::FunctionRegistry;
pub use rpc::{harvest, RpcClient, RpcHandler, RpcMethod, STREAMING_MARKER};
pub use signature::{HostFn, IntoReturn, Signature};
pub use types::{Kind, TypeDesc};
pub use value::{Handle, Mapping, Sequence, Value};
