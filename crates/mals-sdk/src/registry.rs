//! Registry of bridged functions indexed by qualified name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::function::BridgedFunction;
use crate::metadata::FunctionMetadata;
use crate::signature::HostFn;

/// Bridged functions keyed by `package.name`, iterated in name order.
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<BridgedFunction>>,
}

impl FunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Wrap and register a typed host function
    pub fn register<F, Args>(&mut self, package: &str, name: &str, f: F) -> Arc<BridgedFunction>
    where
        F: HostFn<Args>,
    {
        self.insert(BridgedFunction::wrap(f).named(package, name))
    }

    /// Register a prepared function, replacing any with the same name
    pub fn insert(&mut self, function: BridgedFunction) -> Arc<BridgedFunction> {
        let function = Arc::new(function);
        self.functions
            .insert(function.qualified_name(), Arc::clone(&function));
        function
    }

    /// Register several prepared functions
    pub fn extend(&mut self, functions: impl IntoIterator<Item = BridgedFunction>) {
        for function in functions {
            self.insert(function);
        }
    }

    /// Get a function by qualified name
    pub fn get(&self, qualified_name: &str) -> Option<Arc<BridgedFunction>> {
        self.functions.get(qualified_name).cloned()
    }

    /// Check if a function is registered
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.functions.contains_key(qualified_name)
    }

    /// Functions of one package, in name order
    pub fn package(&self, package: &str) -> Vec<Arc<BridgedFunction>> {
        self.functions
            .values()
            .filter(|f| f.package() == package)
            .cloned()
            .collect()
    }

    /// Distinct package names
    pub fn packages(&self) -> BTreeSet<String> {
        self.functions
            .values()
            .map(|f| f.package().to_string())
            .collect()
    }

    /// All functions, in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<BridgedFunction>> {
        self.functions.values()
    }

    /// Metadata for every function, or one package's
    pub fn metadata(&self, package: Option<&str>) -> Vec<FunctionMetadata> {
        self.functions
            .values()
            .filter(|f| package.map_or(true, |p| f.package() == p))
            .map(|f| f.metadata())
            .collect()
    }

    /// Get the number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
