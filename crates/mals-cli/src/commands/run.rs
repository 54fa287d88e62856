//! `mals run` - execute a Lua script with the bridge installed.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mals_lua::{new_runtime, Bridge};
use tracing::info;

/// Run `file`, exposing `args` to the script as the `arg` table
pub fn execute(config: Option<&Path>, file: &Path, args: &[String]) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }
    let config = super::load_config(config)?;
    let messages = config
        .message_registry()
        .context("Invalid message declarations")?;

    let bridge = Bridge::new(Arc::new(messages)).with_render_options(config.render_options());
    let lua = new_runtime(&bridge, &config.runtime).context("Failed to set up Lua runtime")?;

    let arg = lua.create_sequence_from(args.iter().map(String::as_str))?;
    arg.raw_set(0, file.display().to_string())?;
    lua.globals().set("arg", arg)?;

    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    info!(script = %file.display(), "running");
    lua.load(source.as_str())
        .set_name(format!("@{}", file.display()))
        .exec()
        .with_context(|| format!("Script {} failed", file.display()))?;
    Ok(())
}
