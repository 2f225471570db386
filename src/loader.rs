//! Config file loading with `$extends` inheritance
//!
//! Files are YAML (JSON is accepted as a subset). A mapping root may name
//! parent files, relative to its own directory:
//!
//! ```yaml
//! $extends: [base.yaml, region/eu.yaml]
//! server:
//!   port: 8080
//! ```
//!
//! Parents are merged left to right, then the child on top; `$extends` is
//! removed from the result.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DollarError, Result};

pub const EXTENDS_KEY: &str = "$extends";

/// Load a config file and merge it over its parents
pub fn load_config(path: impl AsRef<Path>) -> Result<Value> {
    let mut chain = Vec::new();
    load(path.as_ref(), &mut chain)
}

/// Parse a YAML or JSON document from a string
pub fn parse_document(text: &str) -> Result<Value> {
    Ok(serde_yaml::from_str(text)?)
}

fn load(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Value> {
    let canonical = fs::canonicalize(path)?;
    if chain.contains(&canonical) {
        return Err(DollarError::ExtendsCycle {
            path: path.display().to_string(),
        });
    }

    let mut config = parse_document(&fs::read_to_string(&canonical)?)?;
    let parents = match &mut config {
        Value::Object(map) => map.remove(EXTENDS_KEY),
        _ => None,
    };
    let Some(parents) = parents else {
        return Ok(config);
    };
    let parents = parent_paths(parents, path)?;
    debug!(file = %path.display(), parents = parents.len(), "resolving $extends");

    let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    chain.push(canonical);
    let mut merged = Value::Object(Map::new());
    for parent in parents {
        let parent = load(&dir.join(parent), chain)?;
        deep_merge(&mut merged, parent);
    }
    chain.pop();

    deep_merge(&mut merged, config);
    Ok(merged)
}

fn parent_paths(value: Value, path: &Path) -> Result<Vec<String>> {
    let invalid = |reason: &str| DollarError::InvalidExtends {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(parent) => Ok(vec![parent]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(parent) => Ok(parent),
                _ => Err(invalid("list items must be paths")),
            })
            .collect(),
        _ => Err(invalid("expected a path or a list of paths")),
    }
}

/// Merge `source` into `target`
///
/// Mappings merge key by key; anything else in `source` replaces the target
/// value (arrays are not concatenated).
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
