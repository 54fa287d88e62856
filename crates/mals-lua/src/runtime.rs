//! Lua state setup
//!
//! `new_runtime` produces a state with the bridge installed, the `log`
//! table routed into `tracing`, and the `context` package for building
//! call contexts from scripts.

use std::time::Duration;

use mals_sdk::{CallContext, FunctionRegistry, Help};
use mlua::{Lua, MultiValue, Table};
use tracing::{debug, error, info, warn};

use crate::bridge::Bridge;
use crate::config::RuntimeConfig;

/// Host functions every runtime carries
pub fn builtin_functions() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();

    registry.insert(
        mals_sdk::BridgedFunction::wrap(CallContext::background)
            .named("context", "background")
            .with_help(Help {
                group: "context".into(),
                short: "context without deadline".into(),
                output: vec!["ctx:background context".into()],
                example: "local ctx = context.background()".into(),
                ..Default::default()
            }),
    );

    registry.insert(
        mals_sdk::BridgedFunction::wrap(|ms: i64| {
            CallContext::with_timeout(Duration::from_millis(ms.max(0) as u64))
        })
        .named("context", "timeout")
        .with_help(Help {
            group: "context".into(),
            short: "context expiring after a number of milliseconds".into(),
            input: vec!["ms:timeout in milliseconds".into()],
            output: vec!["ctx:context with deadline".into()],
            example: "local ctx = context.timeout(5000)".into(),
            ..Default::default()
        }),
    );

    registry.insert(
        mals_sdk::BridgedFunction::wrap(|ctx: CallContext| ctx.cancel())
            .named("context", "cancel")
            .with_help(Help {
                group: "context".into(),
                short: "cancel a context and every copy of it".into(),
                input: vec!["ctx:context to cancel".into()],
                example: "context.cancel(ctx)".into(),
                ..Default::default()
            }),
    );

    registry.insert(
        mals_sdk::BridgedFunction::wrap(|ctx: CallContext| ctx.is_done())
            .named("context", "done")
            .with_help(Help {
                group: "context".into(),
                short: "whether a context is cancelled or expired".into(),
                input: vec!["ctx:context to check".into()],
                output: vec!["done:true once cancelled or past the deadline".into()],
                ..Default::default()
            }),
    );

    registry
}

fn render_args(args: MultiValue) -> mlua::Result<String> {
    let parts = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<mlua::Result<Vec<_>>>()?;
    Ok(parts.join(" "))
}

fn log_function(lua: &Lua, emit: fn(&str)) -> mlua::Result<mlua::Function> {
    lua.create_function(move |_, args: MultiValue| {
        emit(&render_args(args)?);
        Ok(())
    })
}

/// Install the `log` table (`debug`, `info`, `warn`, `error`)
pub fn install_log(lua: &Lua) -> mlua::Result<Table> {
    let log = lua.create_table()?;
    log.set("debug", log_function(lua, |text| debug!(target: "mals::script", "{text}"))?)?;
    log.set("info", log_function(lua, |text| info!(target: "mals::script", "{text}"))?)?;
    log.set("warn", log_function(lua, |text| warn!(target: "mals::script", "{text}"))?)?;
    log.set("error", log_function(lua, |text| error!(target: "mals::script", "{text}"))?)?;
    lua.globals().set("log", log.clone())?;
    Ok(log)
}

/// Append entries to `package.path`
pub fn extend_package_path(lua: &Lua, entries: &[String]) -> mlua::Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let package: Table = lua.globals().get("package")?;
    let mut path: String = package.get("path")?;
    for entry in entries {
        path.push(';');
        path.push_str(entry);
    }
    package.set("path", path)
}

/// Create a Lua state wired to `bridge`
pub fn new_runtime(bridge: &Bridge, config: &RuntimeConfig) -> mlua::Result<Lua> {
    let lua = Lua::new();
    bridge.install(&lua, &config.message_global)?;
    if config.install_log {
        install_log(&lua)?;
    }

    let builtins = builtin_functions();
    for package in builtins.packages() {
        bridge.install_package(&lua, &package, &builtins.package(&package))?;
    }

    for package in bridge.messages().packages() {
        bridge.register_package_messages(&lua, &package)?;
    }

    extend_package_path(&lua, &config.package_path)?;
    debug!(target: "mals::loader", "runtime ready");
    Ok(lua)
}
