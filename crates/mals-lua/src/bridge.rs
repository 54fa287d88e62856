//! Invocation bridge: bridged functions as Lua callables
//!
//! Every script call runs the same steps:
//!
//! 1. take the positional arguments;
//! 2. pop a trailing Lua function as the callback when the function
//!    accepts one;
//! 3. convert the remaining arguments to host values;
//! 4. coerce them to the declared parameter types;
//! 5. invoke the function;
//! 6. hand the converted result to the callback (and return nothing), or
//!    return it directly.
//!
//! Failures in steps 3 to 6 abort the call with a single Lua runtime error.

use std::sync::Arc;

use mals_sdk::{BridgeError, BridgedFunction, Coercer, MessageRegistry, RenderOptions};
use mlua::{Function, IntoLuaMulti, Lua, MultiValue, Table, Value as LuaValue};
use tracing::{debug, trace};

use crate::cache::{ScriptCallableCache, ScriptEntry};
use crate::marshal::{host_to_script, script_to_host};
use crate::proxy;
use crate::state::RuntimeState;

fn raise(function: &BridgedFunction, err: BridgeError) -> mlua::Error {
    debug!(target: "mals::bridge", function = %function, error = %err, "bridged call failed");
    mlua::Error::RuntimeError(err.to_string())
}

fn take_callback(function: &BridgedFunction, args: &mut Vec<LuaValue>) -> Option<Function> {
    if !function.expects_callback() {
        return None;
    }
    match args.last() {
        Some(LuaValue::Function(_)) => match args.pop() {
            Some(LuaValue::Function(callback)) => Some(callback),
            _ => None,
        },
        _ => None,
    }
}

/// Build the script-facing entry point for `function`
pub fn build_entry(function: Arc<BridgedFunction>, coercer: Arc<Coercer>) -> ScriptEntry {
    Arc::new(move |lua: &Lua, mut args: Vec<LuaValue>| {
        trace!(target: "mals::bridge", function = %function, args = args.len(), "call");
        let callback = take_callback(&function, &mut args);

        let args = args
            .into_iter()
            .map(|arg| script_to_host(lua, arg))
            .collect::<mlua::Result<Vec<_>>>()?;
        let args = coercer
            .coerce_args(args, function.params())
            .map_err(|err| raise(&function, err))?;
        let result = function.invoke(args).map_err(|err| raise(&function, err))?;
        let result = host_to_script(lua, result)?;

        match callback {
            Some(callback) => {
                callback.call::<()>(result).map_err(|err| {
                    raise(
                        &function,
                        BridgeError::CallbackInvocationFailure(err.to_string()),
                    )
                })?;
                Ok(MultiValue::new())
            }
            None => result.into_lua_multi(lua),
        }
    })
}

/// Owns the callable cache and the settings shared by every Lua state it
/// sets up.
#[derive(Clone)]
pub struct Bridge {
    cache: Arc<ScriptCallableCache>,
    state: RuntimeState,
}

impl Bridge {
    /// Bridge over `messages` with default coercion and rendering
    pub fn new(messages: Arc<MessageRegistry>) -> Self {
        Self {
            cache: Arc::new(ScriptCallableCache::new()),
            state: RuntimeState {
                messages,
                ..RuntimeState::default()
            },
        }
    }

    /// Share an existing cache. Entries are reused only by bridges with the
    /// same coercion rules, so apply `with_coercer` before sharing.
    pub fn with_cache(mut self, cache: Arc<ScriptCallableCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Use custom coercion rules
    pub fn with_coercer(mut self, coercer: Coercer) -> Self {
        self.state.coercer = Arc::new(coercer);
        self
    }

    /// Use custom truncation for message rendering
    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.state.render = Arc::new(render);
        self
    }

    /// The callable cache
    pub fn cache(&self) -> &Arc<ScriptCallableCache> {
        &self.cache
    }

    /// Known message types
    pub fn messages(&self) -> &Arc<MessageRegistry> {
        &self.state.messages
    }

    /// Store the bridge settings in `lua` and install the generic message
    /// factory under `message_global`.
    pub fn install(&self, lua: &Lua, message_global: &str) -> mlua::Result<()> {
        self.state.install(lua);
        proxy::install_message_global(lua, message_global)
    }

    /// Script entry for `function`, from the cache when allowed
    pub fn entry(&self, function: &Arc<BridgedFunction>) -> ScriptEntry {
        self.cache.get_or_build(function, &self.state.coercer, || {
            build_entry(Arc::clone(function), Arc::clone(&self.state.coercer))
        })
    }

    /// Lua function calling `function`
    pub fn create_function(&self, lua: &Lua, function: &Arc<BridgedFunction>) -> mlua::Result<Function> {
        let entry = self.entry(function);
        lua.create_function(move |lua, args: MultiValue| entry(lua, args.into_iter().collect()))
    }

    /// Table holding one Lua function per bridged function, plus `_NAME`
    pub fn package_table(
        &self,
        lua: &Lua,
        package: &str,
        functions: &[Arc<BridgedFunction>],
    ) -> mlua::Result<Table> {
        let table = lua.create_table()?;
        for function in functions {
            table.set(function.name(), self.create_function(lua, function)?)?;
        }
        table.set("_NAME", package)?;
        Ok(table)
    }

    /// Install `functions` as the global table `package`. Functions are
    /// added to an existing global table of that name.
    pub fn install_package(
        &self,
        lua: &Lua,
        package: &str,
        functions: &[Arc<BridgedFunction>],
    ) -> mlua::Result<Table> {
        let globals = lua.globals();
        let table = match globals.get::<LuaValue>(package)? {
            LuaValue::Table(existing) => {
                for function in functions {
                    existing.set(function.name(), self.create_function(lua, function)?)?;
                }
                existing
            }
            _ => {
                let table = self.package_table(lua, package, functions)?;
                globals.set(package, table.clone())?;
                table
            }
        };
        debug!(target: "mals::loader", package, functions = functions.len(), "installed package");
        Ok(table)
    }

    /// Make `functions` loadable with `require(package)`
    pub fn preload_package(
        &self,
        lua: &Lua,
        package: &str,
        functions: Vec<Arc<BridgedFunction>>,
    ) -> mlua::Result<()> {
        let bridge = self.clone();
        let name = package.to_string();
        let loader = lua.create_function(move |lua, _: MultiValue| {
            debug!(target: "mals::loader", package = %name, "loading package");
            bridge.package_table(lua, &name, &functions)
        })?;
        let preload: Table = lua.globals().get::<Table>("package")?.get("preload")?;
        preload.set(package, loader)
    }

    /// Install a global per message type of `package`
    pub fn register_package_messages(&self, lua: &Lua, package: &str) -> mlua::Result<usize> {
        proxy::register_message_types(lua, package)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(Arc::new(MessageRegistry::new()))
    }
}
