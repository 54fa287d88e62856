//! CLI commands
//!
//! Each command exposes `execute(...) -> anyhow::Result<()>`.

pub mod check_config;
pub mod docs;
pub mod run;

use std::path::Path;

use anyhow::Context;
use mals_lua::BridgeConfig;

/// File picked up when `--config` is not given
pub const DEFAULT_CONFIG: &str = "mals.toml";

/// Load `--config`, fall back to `./mals.toml`, then to defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => BridgeConfig::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG)),
        None => Ok(BridgeConfig::default()),
    }
}
