//! Serializable function descriptions for documentation tooling

use serde::{Deserialize, Serialize};

use crate::types::TypeDesc;

/// A named help entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpPair {
    /// Parameter or return name
    pub name: String,
    /// Free-form description
    pub description: String,
}

impl From<(String, String)> for HelpPair {
    fn from((name, description): (String, String)) -> Self {
        Self { name, description }
    }
}

/// Help text with parsed input/output pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpMetadata {
    /// One-line summary
    pub short: String,
    /// Longer description
    pub long: String,
    /// Usage example
    pub example: String,
    /// Parameter descriptions in order
    pub inputs: Vec<HelpPair>,
    /// Return descriptions in order
    pub outputs: Vec<HelpPair>,
}

/// Description of one bridged function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    /// Qualified name (`package.name`)
    pub name: String,
    /// Package
    pub package: String,
    /// Short name
    pub function: String,
    /// Documentation group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Ordered parameter types
    pub params: Vec<TypeDesc>,
    /// Ordered return types
    pub returns: Vec<TypeDesc>,
    /// Whether a trailing callback is accepted
    #[serde(default)]
    pub expects_callback: bool,
    /// Help text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<HelpMetadata>,
}
