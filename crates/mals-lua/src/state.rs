//! Per-state bridge settings stored in the Lua app data

use std::sync::Arc;

use mals_sdk::{Coercer, MessageRegistry, RenderOptions};
use mlua::Lua;

/// Settings every proxy and factory in a Lua state reads.
///
/// Installed once per state by `Bridge::install`. States without it fall
/// back to the defaults and an empty message registry.
#[derive(Clone, Default)]
pub struct RuntimeState {
    /// Coercion rules for field writes
    pub coercer: Arc<Coercer>,
    /// Known message types
    pub messages: Arc<MessageRegistry>,
    /// Truncation used by `__tostring`
    pub render: Arc<RenderOptions>,
}

impl RuntimeState {
    /// Store in the state's app data, replacing any previous settings
    pub fn install(&self, lua: &Lua) {
        lua.set_app_data(self.clone());
    }

    /// Settings of `lua`, or defaults when none were installed
    pub fn current(lua: &Lua) -> RuntimeState {
        lua.app_data_ref::<RuntimeState>()
            .map(|state| RuntimeState::clone(&state))
            .unwrap_or_default()
    }
}
