//! Config facade
//!
//! Owns a parsed document and the function registry its `$function` nodes
//! call into. Every entry point is a pure function of (document, params);
//! each `bind` returns an independent graph.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::bind::BoundConfig;
use crate::error::Result;
use crate::function::FunctionRegistry;
use crate::loader;
use crate::node::Node;
use crate::params::Params;
use crate::request::RequestConfig;
use crate::resolve;

#[derive(Debug, Clone)]
pub struct Config {
    data: Arc<Value>,
    node: Arc<Node>,
    functions: Arc<FunctionRegistry>,
}

impl Config {
    /// Parse a document; malformed keyword payloads are rejected here
    pub fn new(data: Value) -> Result<Self> {
        let node = Node::parse(&data)?;
        Ok(Self {
            data: Arc::new(data),
            node: Arc::new(node),
            functions: Arc::new(FunctionRegistry::new()),
        })
    }

    /// Load a file, following `$extends`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(loader::load_config(path)?)
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    /// Source document
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Resolve eagerly against (possibly nested) params, keeping residuals
    pub fn build(&self, params: &Value) -> Option<Value> {
        self.resolve(&Params::from_value(params))
    }

    pub fn resolve(&self, params: &Params) -> Option<Value> {
        resolve::resolve(&self.node, params)
    }

    /// Bind lazily against params
    pub fn bind(&self, params: &Value) -> BoundConfig {
        self.bind_params(Params::from_value(params))
    }

    pub fn bind_params(&self, params: Params) -> BoundConfig {
        BoundConfig::new(&self.node, params, Arc::clone(&self.functions))
    }

    /// Compute the value at `path`
    ///
    /// Only keyword nodes on the way to `path` are evaluated. A missing key
    /// of a plain object falls back to the object's `$default`.
    pub fn get(&self, path: &str, params: &Value) -> Result<Option<Value>> {
        self.bind(params).get(path)
    }

    /// Request-scoped view with `config.` self lookups
    pub fn for_request(&self, request: &Value) -> RequestConfig {
        RequestConfig::new(self.bind(request))
    }
}

impl TryFrom<Value> for Config {
    type Error = crate::error::DollarError;

    fn try_from(data: Value) -> Result<Self> {
        Config::new(data)
    }
}
