//! Bridged functions and their help metadata

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::metadata::{FunctionMetadata, HelpMetadata, HelpPair};
use crate::signature::{HostFn, Signature};
use crate::types::TypeDesc;
use crate::value::Value;

/// Uniform invocation entry point
pub type Entry = Arc<dyn Fn(Vec<Value>) -> BridgeResult<Value> + Send + Sync>;

// ============================================================================
// Help
// ============================================================================

/// Human-facing documentation attached to a bridged function.
///
/// `input` and `output` hold `"name:description"` strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Help {
    /// Documentation group
    #[serde(default)]
    pub group: String,
    /// Command name used by documentation tooling
    #[serde(default)]
    pub cmd_name: Option<String>,
    /// One-line summary
    #[serde(default)]
    pub short: String,
    /// Longer description
    #[serde(default)]
    pub long: String,
    /// Usage example
    #[serde(default)]
    pub example: String,
    /// Parameter descriptions
    #[serde(default)]
    pub input: Vec<String>,
    /// Return descriptions
    #[serde(default)]
    pub output: Vec<String>,
}

/// Split `"name:description"` on the first colon. Entries without a colon
/// keep the whole text as the name.
pub fn parse_pairs(entries: &[String]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|entry| match entry.split_once(':') {
            Some((name, desc)) => (name.to_string(), desc.to_string()),
            None => (entry.clone(), String::new()),
        })
        .collect()
}

impl Help {
    /// Parsed parameter descriptions
    pub fn format_input(&self) -> Vec<(String, String)> {
        parse_pairs(&self.input)
    }

    /// Parsed return descriptions
    pub fn format_output(&self) -> Vec<(String, String)> {
        parse_pairs(&self.output)
    }
}

// ============================================================================
// BridgedFunction
// ============================================================================

/// A host callable adapted to the uniform call contract.
pub struct BridgedFunction {
    package: String,
    name: String,
    raw_name: String,
    params: Vec<TypeDesc>,
    returns: Vec<TypeDesc>,
    entry: Entry,
    expects_callback: bool,
    disable_cache: bool,
    help: Option<Help>,
}

impl BridgedFunction {
    /// Adapt a typed host function.
    ///
    /// The entry checks arity, then checks each argument's runtime type
    /// against its parameter, and only then invokes `f`.
    pub fn wrap<F, Args>(f: F) -> Self
    where
        F: HostFn<Args>,
    {
        let Signature {
            raw_name,
            params,
            returns,
        } = Signature::of(&f);
        let expected = params.clone();
        let entry: Entry = Arc::new(move |args: Vec<Value>| {
            check_args(&expected, &args)?;
            f.call(args)
        });
        Self::from_entry(raw_name, params, returns, entry)
    }

    /// Build from a prepared entry point. The entry is responsible for its
    /// own argument checks.
    pub fn from_entry(
        raw_name: impl Into<String>,
        params: Vec<TypeDesc>,
        returns: Vec<TypeDesc>,
        entry: Entry,
    ) -> Self {
        Self {
            package: String::new(),
            name: String::new(),
            raw_name: raw_name.into(),
            params,
            returns,
            entry,
            expects_callback: false,
            disable_cache: false,
            help: None,
        }
    }

    /// Set package and name
    pub fn named(mut self, package: impl Into<String>, name: impl Into<String>) -> Self {
        self.package = package.into();
        self.name = name.into();
        self
    }

    /// Accept a trailing script callback that receives the result
    pub fn with_callback(mut self) -> Self {
        self.expects_callback = true;
        self
    }

    /// Build a fresh script wrapper on every lookup
    pub fn without_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    /// Attach help metadata
    pub fn with_help(mut self, help: Help) -> Self {
        self.help = Some(help);
        self
    }

    /// Package name
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `package.name`, or just the name when there is no package
    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Rust type name of the underlying callable
    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    /// Ordered parameter types
    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    /// Ordered return types
    pub fn returns(&self) -> &[TypeDesc] {
        &self.returns
    }

    /// Whether a trailing callback is accepted
    pub fn expects_callback(&self) -> bool {
        self.expects_callback
    }

    /// Whether the script wrapper bypasses the cache
    pub fn disable_cache(&self) -> bool {
        self.disable_cache
    }

    /// Help metadata
    pub fn help(&self) -> Option<&Help> {
        self.help.as_ref()
    }

    /// Invoke the entry point
    pub fn invoke(&self, args: Vec<Value>) -> BridgeResult<Value> {
        (self.entry)(args)
    }

    /// Serializable description
    pub fn metadata(&self) -> FunctionMetadata {
        let help = self.help.as_ref().map(|help| HelpMetadata {
            short: help.short.clone(),
            long: help.long.clone(),
            example: help.example.clone(),
            inputs: help.format_input().into_iter().map(HelpPair::from).collect(),
            outputs: help.format_output().into_iter().map(HelpPair::from).collect(),
        });
        FunctionMetadata {
            name: self.qualified_name(),
            package: self.package.clone(),
            function: self.name.clone(),
            group: self.help.as_ref().map(|h| h.group.clone()).filter(|g| !g.is_empty()),
            params: self.params.clone(),
            returns: self.returns.clone(),
            expects_callback: self.expects_callback,
            help,
        }
    }
}

impl fmt::Debug for BridgedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgedFunction")
            .field("name", &self.qualified_name())
            .field("raw_name", &self.raw_name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("expects_callback", &self.expects_callback)
            .field("disable_cache", &self.disable_cache)
            .finish()
    }
}

impl fmt::Display for BridgedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

fn check_args(params: &[TypeDesc], args: &[Value]) -> BridgeResult<()> {
    if args.len() != params.len() {
        return Err(BridgeError::ArityMismatch {
            expected: params.len(),
            actual: args.len(),
        });
    }
    for (i, (param, arg)) in params.iter().zip(args).enumerate() {
        let actual = arg.type_desc();
        if !param.accepts(&actual) {
            return Err(BridgeError::TypeMismatch {
                position: i + 1,
                expected: param.clone(),
                actual,
            });
        }
    }
    Ok(())
}
