//! mals Lua - the Lua 5.4 side of the script bridge
//!
//! Turns the host-side pieces of `mals-sdk` into things a Lua state can
//! call and hold: bridged functions become Lua functions, messages become
//! proxies with field access, and package loaders expose both.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mals_lua::{new_runtime, Bridge, RuntimeConfig};
//! use mals_sdk::{FunctionRegistry, MessageRegistry};
//!
//! let mut functions = FunctionRegistry::new();
//! functions.register("math", "add", |a: i64, b: i64| a + b);
//!
//! let bridge = Bridge::new(Arc::new(MessageRegistry::new()));
//! let lua = new_runtime(&bridge, &RuntimeConfig::default())?;
//! bridge.install_package(&lua, "math", &functions.package("math"))?;
//! let sum: i64 = lua.load("return math.add(1, 2)").eval()?;
//! ```

#![warn(missing_docs)]

pub mod bridge;
pub mod cache;
pub mod config;
pub mod docs;
pub mod marshal;
pub mod proxy;
pub mod runtime;
pub mod state;

pub use bridge::{build_entry, Bridge};
pub use cache::{ScriptCallableCache, ScriptEntry};
pub use config::{parse_field_type, BridgeConfig, ConfigError, MessageConfig, RenderConfig, RuntimeConfig};
pub use docs::{generate_definitions, generate_markdown, lua_type};
pub use marshal::{host_to_script, script_to_host, HostValue, ScriptRef};
pub use proxy::{construct, install_message_global, register_message_types, MessageProxy};
pub use runtime::{builtin_functions, install_log, new_runtime};
pub use state::RuntimeState;
