//! Message proxies and message factories
//!
//! A `MessageProxy` is the Lua face of a live message instance. Reads go
//! through `__index`, writes through `__newindex`, and `tostring` renders a
//! truncated copy. Rejected writes are logged and dropped, never raised.


use mals_sdk::{BridgeError, MessageRef, MessageType};
use mlua::{Lua, MetaMethod, Table, UserData, UserDataMethods, Value as LuaValue};
use tracing::warn;

use crate::marshal::{host_to_script, key_text, script_to_host};
use crate::state::RuntimeState;

/// Lua userdata wrapping a shared message instance
pub struct MessageProxy {
    message: MessageRef,
}

impl MessageProxy {
    /// Wrap a message instance
    pub fn new(message: MessageRef) -> Self {
        Self { message }
    }

    /// The wrapped instance
    pub fn message(&self) -> &MessageRef {
        &self.message
    }
}

/// Write one field with script semantics, logging instead of failing
pub fn write_field(lua: &Lua, message: &MessageRef, field: &str, value: LuaValue) {
    let value = match script_to_host(lua, value) {
        Ok(value) => value,
        Err(err) => {
            warn!(target: "mals::proxy", field, error = %err, "dropping field write");
            return;
        }
    };
    // Messages must stay acyclic.
    if value.reaches(message) {
        warn!(target: "mals::proxy", field, "dropping write that would make a message reach itself");
        return;
    }
    let coercer = RuntimeState::current(lua).coercer;
    let mut guard = message.lock();
    if let Err(err) = guard.assign(field, value, &coercer) {
        warn!(target: "mals::proxy", message = guard.full_name(), field, error = %err, "dropping field write");
    }
}

impl UserData for MessageProxy {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            let value = this.message.lock().get(&key);
            match value {
                Some(value) => host_to_script(lua, value),
                None => Ok(LuaValue::Nil),
            }
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (String, LuaValue)| {
                write_field(lua, &this.message, &key, value);
                Ok(())
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |lua, this, ()| {
            let render = RuntimeState::current(lua).render;
            let text = this.message.lock().render(&render);
            Ok(text)
        });
    }
}

// ============================================================================
// Factories
// ============================================================================

/// Instantiate `ty`, apply `init` field by field and wrap the result
pub fn construct(lua: &Lua, ty: &MessageType, init: Option<Table>) -> mlua::Result<LuaValue> {
    let message = ty.instantiate().into_ref();
    if let Some(init) = init {
        for pair in init.pairs::<LuaValue, LuaValue>() {
            let (key, value) = pair?;
            let field = key_text(&key)?;
            write_field(lua, &message, &field, value);
        }
    }
    Ok(LuaValue::UserData(lua.create_userdata(MessageProxy::new(message))?))
}

/// Install `global` with a `New(type_name, init?)` factory returning
/// `proxy` or `nil, "invalid message type: <name>"`.
pub fn install_message_global(lua: &Lua, global: &str) -> mlua::Result<()> {
    let table = lua.create_table()?;
    let new = lua.create_function(|lua, (name, init): (String, Option<Table>)| {
        let state = RuntimeState::current(lua);
        match state.messages.get(&name) {
            Some(ty) => Ok((construct(lua, ty, init)?, None)),
            None => Ok((
                LuaValue::Nil,
                Some(BridgeError::MessageTypeNotRegistered(name).to_string()),
            )),
        }
    })?;
    table.set("New", new)?;
    lua.globals().set(global, table)
}

/// Install one global per message type of `package` (full names of exactly
/// two segments), each with a `New(init?)` factory. Returns the number of
/// types installed.
pub fn register_message_types(lua: &Lua, package: &str) -> mlua::Result<usize> {
    let state = RuntimeState::current(lua);
    let globals = lua.globals();
    let mut count = 0;
    for ty in state.messages.package_types(package) {
        let full_name = ty.descriptor().full_name().to_string();
        let table = lua.create_table()?;
        table.set("_NAME", full_name.as_str())?;

        let name = full_name.clone();
        let new = lua.create_function(move |lua, init: Option<Table>| {
            let state = RuntimeState::current(lua);
            match state.messages.get(&name) {
                Some(ty) => construct(lua, ty, init),
                None => Err(mlua::Error::RuntimeError(
                    BridgeError::MessageTypeNotRegistered(name.clone()).to_string(),
                )),
            }
        })?;
        table.set("New", new)?;
        globals.set(ty.descriptor().short_name(), table)?;
        count += 1;
        tracing::debug!(target: "mals::loader", message = %full_name, "registered message type");
    }
    Ok(count)
}
