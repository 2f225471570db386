//! Request-scoped config access
//!
//! A [`RequestConfig`] binds the document with the incoming request as
//! params. The bound graph is itself reachable from keyword lookups under
//! `config.`, so one key can be derived from another:
//!
//! ```yaml
//! host: {$param: [headers.host, example.org]}
//! url: {$template: "https://${config.host}/"}
//! ```

use serde_json::Value;

use crate::bind::BoundConfig;
use crate::error::Result;

/// Param prefix that reads the request's own bound config
pub const CONFIG_KEY: &str = "config";

#[derive(Debug)]
pub struct RequestConfig {
    bound: BoundConfig,
}

impl RequestConfig {
    pub(crate) fn new(bound: BoundConfig) -> Self {
        Self {
            bound: bound.with_self_key(CONFIG_KEY),
        }
    }

    /// Read a dot-path, evaluating lazily
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.bound.get(path)
    }

    /// Override a value for the rest of this request
    pub fn set(&self, path: &str, value: Value) -> Result<()> {
        self.bound.set(path, value)
    }

    pub fn bound(&self) -> &BoundConfig {
        &self.bound
    }

    /// Evaluate the whole document for this request
    pub fn to_value(&self) -> Result<Option<Value>> {
        self.bound.to_value()
    }
}
