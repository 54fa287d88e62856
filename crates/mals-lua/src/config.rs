//! Bridge configuration (mals.toml)
//!
//! ```toml
//! [render]
//! truncate_limit = 1024
//! truncate_marker = "......"
//!
//! [runtime]
//! message_global = "Message"
//! install_log = true
//! package_path = ["./scripts/?.lua"]
//!
//! [[messages]]
//! name = "demo.Task"
//! read_only = ["Id"]
//! fields = { Id = "int", Name = "string", Tags = "[string]", Owner = "message:demo.User" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use mals_sdk::{FieldDescriptor, MessageDescriptor, MessageRegistry, RenderOptions, TypeDesc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A declared field type is not understood
    #[error("Invalid type `{ty}` for field {message}.{field}")]
    InvalidType {
        /// Message type name
        message: String,
        /// Field name
        field: String,
        /// The offending type string
        ty: String,
    },

    /// A read-only entry names a field that is not declared
    #[error("Unknown field {message}.{field} in read_only")]
    UnknownField {
        /// Message type name
        message: String,
        /// Field name
        field: String,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Message rendering
    #[serde(default)]
    pub render: RenderConfig,

    /// Runtime setup
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Declarative message types
    #[serde(default)]
    pub messages: Vec<MessageConfig>,
}

/// Truncation settings for `tostring` on messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Characters (or bytes) kept per field
    #[serde(default = "default_truncate_limit")]
    pub truncate_limit: usize,

    /// Suffix marking a truncated field
    #[serde(default = "default_truncate_marker")]
    pub truncate_marker: String,
}

fn default_truncate_limit() -> usize {
    mals_sdk::DEFAULT_TRUNCATE_LIMIT
}

fn default_truncate_marker() -> String {
    mals_sdk::DEFAULT_TRUNCATE_MARKER.to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            truncate_limit: default_truncate_limit(),
            truncate_marker: default_truncate_marker(),
        }
    }
}

/// Lua state setup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Global holding the generic `New(type_name, init)` factory
    #[serde(default = "default_message_global")]
    pub message_global: String,

    /// Install the `log` table
    #[serde(default = "default_install_log")]
    pub install_log: bool,

    /// Extra `package.path` entries
    #[serde(default)]
    pub package_path: Vec<String>,
}

fn default_message_global() -> String {
    "Message".to_string()
}

fn default_install_log() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            message_global: default_message_global(),
            install_log: default_install_log(),
            package_path: Vec::new(),
        }
    }
}

/// A message type declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageConfig {
    /// Full name, e.g. `demo.Task`
    pub name: String,

    /// Field name to type string. Fields are laid out in name order.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    /// Fields scripts may not assign
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_only: Vec<String>,
}

/// Parse a field type: `bool`, `int`, `float`, `string`, `bytes`, `any`,
/// `message:<full.Name>`, or any of these in brackets for a list.
pub fn parse_field_type(decl: &str) -> Option<TypeDesc> {
    let decl = decl.trim();
    match decl.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => parse_scalar(inner.trim()).map(TypeDesc::seq),
        None => parse_scalar(decl),
    }
}

fn parse_scalar(decl: &str) -> Option<TypeDesc> {
    match decl {
        "bool" => Some(TypeDesc::Bool),
        "int" => Some(TypeDesc::Int),
        "float" => Some(TypeDesc::Float),
        "string" => Some(TypeDesc::Text),
        "bytes" => Some(TypeDesc::Bytes),
        "any" => Some(TypeDesc::Any),
        _ => decl
            .strip_prefix("message:")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(TypeDesc::message),
    }
}

impl BridgeConfig {
    /// Load from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse from a string and validate
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every declared message type
    pub fn validate(&self) -> Result<(), ConfigError> {
        for message in &self.messages {
            message.descriptor()?;
        }
        Ok(())
    }

    /// Render options for message proxies
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            limit: self.render.truncate_limit,
            marker: self.render.truncate_marker.clone(),
        }
    }

    /// Registry holding every declared message type
    pub fn message_registry(&self) -> Result<MessageRegistry, ConfigError> {
        let mut registry = MessageRegistry::new();
        for message in &self.messages {
            registry.register(message.descriptor()?);
        }
        Ok(registry)
    }
}

impl MessageConfig {
    /// Build the message descriptor
    pub fn descriptor(&self) -> Result<MessageDescriptor, ConfigError> {
        for field in &self.read_only {
            if !self.fields.contains_key(field) {
                return Err(ConfigError::UnknownField {
                    message: self.name.clone(),
                    field: field.clone(),
                });
            }
        }
        let fields = self
            .fields
            .iter()
            .map(|(name, ty)| {
                let parsed = parse_field_type(ty).ok_or_else(|| ConfigError::InvalidType {
                    message: self.name.clone(),
                    field: name.clone(),
                    ty: ty.clone(),
                })?;
                Ok(if self.read_only.contains(name) {
                    FieldDescriptor::read_only(name.as_str(), parsed)
                } else {
                    FieldDescriptor::new(name.as_str(), parsed)
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(MessageDescriptor::new(self.name.as_str(), fields))
    }
}
