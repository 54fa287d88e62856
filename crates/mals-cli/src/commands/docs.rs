//! `mals docs` - generate documentation for a bridged package.

use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use mals_lua::{builtin_functions, generate_definitions, generate_markdown};
use mals_sdk::{FunctionMetadata, MessageRegistry};
use tracing::info;

/// Documentation output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocFormat {
    /// LuaLS definition stubs
    Lua,
    /// Markdown reference
    Markdown,
    /// Function metadata as JSON
    Json,
}

/// Render documentation for `package`
pub fn render(
    format: DocFormat,
    functions: &[FunctionMetadata],
    messages: &MessageRegistry,
    package: &str,
) -> anyhow::Result<String> {
    Ok(match format {
        DocFormat::Lua => generate_definitions(functions, messages, package),
        DocFormat::Markdown => generate_markdown(functions, package),
        DocFormat::Json => {
            let selected: Vec<&FunctionMetadata> =
                functions.iter().filter(|f| f.package == package).collect();
            serde_json::to_string_pretty(&selected).context("Failed to serialize metadata")?
        }
    })
}

/// Write documentation to `out`, or stdout when absent
pub fn execute(
    config: Option<&Path>,
    format: DocFormat,
    package: &str,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let config = super::load_config(config)?;
    let messages = config
        .message_registry()
        .context("Invalid message declarations")?;
    let functions = builtin_functions().metadata(Some(package));

    if functions.is_empty() && messages.package_types(package).next().is_none() {
        anyhow::bail!("Nothing to document in package '{}'", package);
    }

    let text = render(format, &functions, &messages, package)?;
    match out {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(package, path = %path.display(), "documentation written");
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_formats() {
        let functions = builtin_functions().metadata(Some("context"));
        let messages = MessageRegistry::new();

        let lua = render(DocFormat::Lua, &functions, &messages, "context").unwrap();
        assert!(lua.contains("function context.background() end"));

        let markdown = render(DocFormat::Markdown, &functions, &messages, "context").unwrap();
        assert!(markdown.starts_with("## context\n"));

        let json = render(DocFormat::Json, &functions, &messages, "context").unwrap();
        let parsed: Vec<FunctionMetadata> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn test_unknown_package() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = temp.path().join("mals.toml");
        std::fs::write(&config, "").unwrap();
        let err = execute(Some(&config), DocFormat::Lua, "nope", None).unwrap_err();
        assert!(err.to_string().contains("Nothing to document"));
    }

    #[test]
    fn test_writes_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = temp.path().join("mals.toml");
        std::fs::write(
            &config,
            "[[messages]]\nname = \"demo.Task\"\nfields = { Name = \"string\" }\n",
        )
        .unwrap();
        let out = temp.path().join("demo.lua");
        execute(Some(&config), DocFormat::Lua, "demo", Some(&out)).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("--- @class Task\n--- @field Name string\n"));
    }
}
