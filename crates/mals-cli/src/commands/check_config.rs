//! `mals check-config` - validate a configuration file.

use std::path::Path;

use anyhow::Context;
use mals_lua::{docs::lua_type, BridgeConfig};

/// Summary printed for a valid configuration
pub fn summary(config: &BridgeConfig) -> anyhow::Result<String> {
    let registry = config.message_registry()?;
    let mut lines = vec![
        format!(
            "render: truncate_limit={} truncate_marker={:?}",
            config.render.truncate_limit, config.render.truncate_marker
        ),
        format!(
            "runtime: message_global={} install_log={} package_path={:?}",
            config.runtime.message_global, config.runtime.install_log, config.runtime.package_path
        ),
        format!("messages: {}", registry.len()),
    ];
    for ty in registry.iter() {
        let descriptor = ty.descriptor();
        lines.push(format!("  {}", descriptor.full_name()));
        for field in descriptor.fields() {
            let access = if field.writable() { "" } else { " (read-only)" };
            lines.push(format!("    {}: {}{}", field.name(), lua_type(field.ty()), access));
        }
    }
    Ok(lines.join("\n"))
}

/// Load, validate and summarize `file`
pub fn execute(file: &Path) -> anyhow::Result<()> {
    let config = BridgeConfig::from_file(file)
        .with_context(|| format!("Invalid config {}", file.display()))?;
    println!("{}", summary(&config)?);
    println!("{} is valid", file.display());
    Ok(())
}
