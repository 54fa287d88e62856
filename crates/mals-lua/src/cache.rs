//! Cache of script-facing entry points, keyed by qualified function name.

use std::collections::HashMap;
use std::sync::Arc;

use mals_sdk::{BridgedFunction, Coercer};
use mlua::{Lua, MultiValue, Value as LuaValue};
use parking_lot::RwLock;
use tracing::{debug, trace};

/// Script-facing entry point of a bridged function
pub type ScriptEntry = Arc<dyn Fn(&Lua, Vec<LuaValue>) -> mlua::Result<MultiValue> + Send + Sync>;

/// Entry points built once per qualified name and shared by every Lua
/// state created from the same bridge.
///
/// An entry remembers the coercion rules it was built with. Callers using
/// other rules get a fresh, unstored entry.
#[derive(Default)]
pub struct ScriptCallableCache {
    entries: RwLock<HashMap<String, Cached>>,
}

struct Cached {
    entry: ScriptEntry,
    coercer: Arc<Coercer>,
}

impl Cached {
    fn matching(&self, coercer: &Arc<Coercer>) -> Option<ScriptEntry> {
        Arc::ptr_eq(&self.coercer, coercer).then(|| Arc::clone(&self.entry))
    }
}

impl ScriptCallableCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for a qualified name
    pub fn get(&self, qualified_name: &str) -> Option<ScriptEntry> {
        self.entries
            .read()
            .get(qualified_name)
            .map(|cached| Arc::clone(&cached.entry))
    }

    /// Return the cached entry for `function`, building and publishing it on
    /// first use. Functions with caching disabled get a fresh entry every
    /// time and are never stored.
    pub fn get_or_build(
        &self,
        function: &BridgedFunction,
        coercer: &Arc<Coercer>,
        build: impl FnOnce() -> ScriptEntry,
    ) -> ScriptEntry {
        if function.disable_cache() {
            trace!(target: "mals::cache", function = %function, "cache disabled, building entry");
            return build();
        }

        let name = function.qualified_name();
        if let Some(cached) = self.entries.read().get(&name) {
            if let Some(entry) = cached.matching(coercer) {
                return entry;
            }
            debug!(target: "mals::cache", function = %name, "cached entry uses other coercion rules, building");
            return build();
        }

        let mut entries = self.entries.write();
        if let Some(cached) = entries.get(&name) {
            return cached.matching(coercer).unwrap_or_else(build);
        }
        let entry = build();
        debug!(target: "mals::cache", function = %name, "built script entry");
        entries.insert(
            name,
            Cached {
                entry: Arc::clone(&entry),
                coercer: Arc::clone(coercer),
            },
        );
        entry
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
