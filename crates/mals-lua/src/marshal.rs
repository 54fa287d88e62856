//! Value marshaling between Lua and the host
//!
//! Script to host: tables become sequences when their keys are exactly
//! `1..N` (N being the raw length) and text-keyed mappings otherwise.
//! Functions and foreign userdata are kept alive in the Lua registry and
//! travel as handles, so handing them back to Lua yields the same value.
//!
//! Host to script: primitives map directly, messages become proxies,
//! text sequences become plain tables, and every other container or opaque
//! value is wrapped in a read-only `HostValue` userdata.

use mals_sdk::{Handle, Mapping, Sequence, TypeDesc, Value};
use mlua::{Lua, MetaMethod, RegistryKey, Table, UserData, UserDataMethods, Value as LuaValue};

use crate::proxy::MessageProxy;

/// Deepest table nesting converted before giving up
pub const MAX_DEPTH: usize = 128;

// ============================================================================
// Registry-held script values
// ============================================================================

/// A Lua value pinned in the registry of the state that produced it
pub struct ScriptRef {
    key: RegistryKey,
}

impl ScriptRef {
    /// Pin `value` in the registry
    pub fn new(lua: &Lua, value: LuaValue) -> mlua::Result<Self> {
        Ok(Self {
            key: lua.create_registry_value(value)?,
        })
    }

    /// The pinned value. Fails when `lua` is not the owning state.
    pub fn value(&self, lua: &Lua) -> mlua::Result<LuaValue> {
        lua.registry_value(&self.key)
    }
}

fn pinned(lua: &Lua, value: LuaValue) -> mlua::Result<Handle> {
    Ok(Handle::new(ScriptRef::new(lua, value)?))
}

// ============================================================================
// Script -> host
// ============================================================================

/// Convert a Lua value to a host value
pub fn script_to_host(lua: &Lua, value: LuaValue) -> mlua::Result<Value> {
    to_host(lua, value, 0)
}

fn to_host(lua: &Lua, value: LuaValue, depth: usize) -> mlua::Result<Value> {
    Ok(match value {
        LuaValue::Nil => Value::Nil,
        LuaValue::Boolean(b) => Value::Bool(b),
        LuaValue::Integer(i) => Value::Int(i),
        LuaValue::Number(n) => number_to_host(n),
        LuaValue::String(s) => Value::Text(String::from_utf8_lossy(&s.as_bytes()).into_owned()),
        LuaValue::Table(table) => table_to_host(lua, table, depth)?,
        function @ LuaValue::Function(_) => Value::Callable(pinned(lua, function)?),
        LuaValue::UserData(ud) => {
            if let Ok(proxy) = ud.borrow::<MessageProxy>() {
                return Ok(Value::Message(proxy.message().clone()));
            }
            if let Ok(host) = ud.borrow::<HostValue>() {
                return Ok(host.value().clone());
            }
            Value::Opaque(pinned(lua, LuaValue::UserData(ud))?)
        }
        light @ LuaValue::LightUserData(_) => Value::Opaque(pinned(lua, light)?),
        other => Value::Text(other.to_string()?),
    })
}

/// Integral numbers that fit an `i64` become integers
pub fn number_to_host(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

/// Text form of a table key, as Lua's string conversion would give it
pub fn key_text(key: &LuaValue) -> mlua::Result<String> {
    match key {
        LuaValue::String(s) => Ok(String::from_utf8_lossy(&s.as_bytes()).into_owned()),
        LuaValue::Integer(i) => Ok(i.to_string()),
        other => other.to_string(),
    }
}

/// Whether a table's keys are exactly `1..=raw_len`
pub fn is_sequence(table: &Table) -> mlua::Result<bool> {
    let len = table.raw_len();
    let mut count = 0usize;
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, _) = pair?;
        match key {
            LuaValue::Integer(i) if i >= 1 && (i as u64) <= len as u64 => count += 1,
            _ => return Ok(false),
        }
    }
    Ok(count == len)
}

fn table_to_host(lua: &Lua, table: Table, depth: usize) -> mlua::Result<Value> {
    if depth >= MAX_DEPTH {
        return Err(mlua::Error::RuntimeError(format!(
            "table nesting exceeds {MAX_DEPTH} levels"
        )));
    }

    if is_sequence(&table)? {
        let len = table.raw_len();
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
            items.push(to_host(lua, table.raw_get::<LuaValue>(i)?, depth + 1)?);
        }
        return Ok(Value::Seq(Sequence::any(items)));
    }

    let mut map = Mapping::text_keyed();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair?;
        let key = key_text(&key)?;
        map.insert(Value::Text(key), to_host(lua, value, depth + 1)?);
    }
    Ok(Value::Map(map))
}

// ============================================================================
// Host -> script
// ============================================================================

/// Convert a host value to a Lua value
pub fn host_to_script(lua: &Lua, value: Value) -> mlua::Result<LuaValue> {
    Ok(match value {
        Value::Nil => LuaValue::Nil,
        Value::Bool(b) => LuaValue::Boolean(b),
        Value::Int(i) => LuaValue::Integer(i),
        Value::Float(f) => LuaValue::Number(f),
        Value::Text(s) => LuaValue::String(lua.create_string(&s)?),
        Value::Bytes(b) => LuaValue::String(lua.create_string(&b)?),
        Value::Message(message) => LuaValue::UserData(lua.create_userdata(MessageProxy::new(message))?),
        Value::Seq(seq) if *seq.elem() == TypeDesc::Text => {
            let table = lua.create_table_with_capacity(seq.len(), 0)?;
            for (i, item) in seq.into_items().into_iter().enumerate() {
                table.raw_set(i + 1, host_to_script(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
        Value::Callable(handle) | Value::Opaque(handle) if handle.is::<ScriptRef>() => {
            match handle.downcast_ref::<ScriptRef>() {
                Some(script) => script.value(lua)?,
                None => LuaValue::Nil,
            }
        }
        other => LuaValue::UserData(lua.create_userdata(HostValue::new(other))?),
    })
}

// ============================================================================
// Generic host-value adapter
// ============================================================================

/// Read-only view of a host value that has no native Lua shape.
///
/// Sequences index from 1, mappings by key; `#` gives the element count and
/// `tostring` the value's text rendering.
pub struct HostValue {
    value: Value,
}

impl HostValue {
    /// Wrap a host value
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Wrapped value
    pub fn value(&self) -> &Value {
        &self.value
    }

    fn index(&self, lua: &Lua, key: LuaValue) -> mlua::Result<LuaValue> {
        match &self.value {
            Value::Seq(seq) => {
                let index = match script_to_host(lua, key)? {
                    Value::Int(i) if i >= 1 => (i - 1) as usize,
                    _ => return Ok(LuaValue::Nil),
                };
                match seq.get(index) {
                    Some(item) => host_to_script(lua, item.clone()),
                    None => Ok(LuaValue::Nil),
                }
            }
            Value::Map(map) => {
                let key = script_to_host(lua, key)?;
                let found = map.get(&key).or_else(|| {
                    let text = key.render_text();
                    map.entries()
                        .iter()
                        .find(|(k, _)| k.render_text() == text)
                        .map(|(_, v)| v)
                });
                match found {
                    Some(item) => host_to_script(lua, item.clone()),
                    None => Ok(LuaValue::Nil),
                }
            }
            _ => Ok(LuaValue::Nil),
        }
    }

    fn len(&self) -> usize {
        match &self.value {
            Value::Seq(seq) => seq.len(),
            Value::Map(map) => map.len(),
            Value::Text(s) => s.len(),
            Value::Bytes(b) => b.len(),
            _ => 0,
        }
    }
}

impl UserData for HostValue {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: LuaValue| this.index(lua, key));
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.len()));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.value.render_text()));
    }
}
