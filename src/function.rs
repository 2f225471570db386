//! Function registry for `$function` nodes
//!
//! Names are flat strings; dotted names (`geo.country`) come either from
//! registering them directly or from nesting one registry under a prefix.

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{DollarError, Result};

/// A registered unary function: `(merged params) -> value`
pub type Function = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, Function>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a function under `name`
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Builder form of [`FunctionRegistry::register`]
    pub fn with<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    /// Mount every function of `other` under `prefix.`
    pub fn nest(mut self, prefix: &str, other: FunctionRegistry) -> Self {
        for (name, function) in other.functions {
            self.functions.insert(format!("{}.{}", prefix, name), function);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Invoke `name` with `params`
    ///
    /// A missing name is a configuration bug and fails loudly.
    pub fn call(&self, name: &str, params: &Value) -> Result<Value> {
        let function = self.get(name).ok_or_else(|| DollarError::UnknownFunction {
            name: name.to_string(),
        })?;
        (**function)(params).map_err(|e| DollarError::FunctionFailed {
            name: name.to_string(),
            reason: format!("{:#}", e),
        })
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}
