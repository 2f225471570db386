//! Schema macro generator
//!
//! A schema position written as `{"dynamic": F}` accepts either a plain
//! value matching `F` or any well-formed keyword node whose nested values
//! accept the same thing. Expansion replaces the keyword with a `$ref` to a
//! generated composite schema:
//!
//! ```text
//! {"dynamic": {"type": "number"}}
//!   → {"$ref": "#/$defs/c814f144-cb8d-5269-93c4-da79a8b2f6cd"}
//! ```
//!
//! Composite ids are uuid v5 (URL namespace) over the canonical JSON of the
//! fragment, so identical fragments anywhere in a schema share one composite.

mod cache;
mod composite;
mod validator;

pub use cache::{CacheStats, CachedComposite, SchemaCache, SCHEMA_CACHE};
pub use composite::pointer;
pub use validator::{DynamicValidator, DRAFT_2020_12};

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DollarError, Result};

/// Macro keyword recognised in schema positions
pub const DYNAMIC: &str = "dynamic";

/// Keywords whose value maps names to subschemas
const SCHEMA_MAPS: [&str; 5] = [
    "properties",
    "patternProperties",
    "$defs",
    "definitions",
    "dependentSchemas",
];

/// Keywords whose value is instance data, never a schema
const INSTANCE_DATA: [&str; 4] = ["enum", "const", "examples", "default"];

/// Content id of a fragment
pub fn fragment_id(fragment: &Value) -> String {
    let mut text = String::new();
    canonical(fragment, &mut text);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, text.as_bytes()).to_string()
}

/// Compact JSON with object keys sorted at every level
fn canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}

/// Expands `dynamic` keywords against a [`SchemaCache`]
///
/// Counts how many times each composite is referenced by the expanded
/// schema; composites generated for nested fragments register with the
/// cache but are not counted as uses.
pub struct SchemaExpander<'c> {
    cache: &'c SchemaCache,
    uses: BTreeMap<String, usize>,
}

impl<'c> SchemaExpander<'c> {
    pub fn new(cache: &'c SchemaCache) -> Self {
        Self {
            cache,
            uses: BTreeMap::new(),
        }
    }

    /// Reference count per composite id
    pub fn uses(&self) -> &BTreeMap<String, usize> {
        &self.uses
    }

    pub fn into_uses(self) -> BTreeMap<String, usize> {
        self.uses
    }

    /// Expand every `dynamic` keyword in `schema`
    pub fn expand(&mut self, schema: &Value) -> Result<Value> {
        match schema {
            Value::Object(map) => self.expand_object(map),
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn expand_object(&mut self, map: &Map<String, Value>) -> Result<Value> {
        let mut out = Map::with_capacity(map.len());
        let mut reference = None;

        for (key, value) in map {
            let expanded = match key.as_str() {
                DYNAMIC => {
                    reference = Some(self.reference(value)?);
                    continue;
                }
                k if SCHEMA_MAPS.contains(&k) => match value {
                    Value::Object(entries) => {
                        let mut expanded = Map::with_capacity(entries.len());
                        for (name, subschema) in entries {
                            expanded.insert(name.clone(), self.expand(subschema)?);
                        }
                        Value::Object(expanded)
                    }
                    other => other.clone(),
                },
                k if INSTANCE_DATA.contains(&k) => value.clone(),
                _ => self.expand(value)?,
            };
            out.insert(key.clone(), expanded);
        }

        if let Some(reference) = reference {
            if out.contains_key("$ref") {
                // Keep the user's own $ref next to ours
                let mut all_of = match out.remove("allOf") {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                all_of.push(reference);
                out.insert("allOf".to_string(), Value::Array(all_of));
            } else if let Value::Object(reference) = reference {
                out.extend(reference);
            }
        }

        Ok(Value::Object(out))
    }

    /// `{"$ref": ..}` to the composite for `fragment`, generating it on a
    /// cache miss
    pub fn reference(&mut self, fragment: &Value) -> Result<Value> {
        if !matches!(fragment, Value::Object(_) | Value::Bool(_)) {
            return Err(DollarError::SchemaCompile {
                reason: format!("`{}` expects a schema, got {}", DYNAMIC, fragment),
            });
        }

        let id = fragment_id(fragment);
        *self.uses.entry(id.clone()).or_insert(0) += 1;

        if !self.cache.contains(&id) {
            debug!(id = %id, "composite cache miss");
            let mut nested = SchemaExpander::new(self.cache);
            let expanded = nested.expand(fragment)?;
            self.cache.insert(
                id.clone(),
                CachedComposite {
                    schema: Arc::new(composite::composite(expanded, &id)),
                    deps: nested.into_uses().into_keys().collect(),
                },
            );
        }

        Ok(json!({ "$ref": pointer(&id) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_id_is_stable() {
        assert_eq!(
            fragment_id(&json!({"type": "number"})),
            "c814f144-cb8d-5269-93c4-da79a8b2f6cd"
        );
    }

    #[test]
    fn fragment_id_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"type":"string","minLength":1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"minLength":1,"type":"string"}"#).unwrap();
        assert_eq!(fragment_id(&a), fragment_id(&b));
    }

    #[test]
    fn expand_replaces_dynamic_with_ref() {
        let cache = SchemaCache::new();
        let mut expander = SchemaExpander::new(&cache);
        let expanded = expander
            .expand(&json!({
                "type": "object",
                "properties": {"port": {"dynamic": {"type": "number"}, "description": "port"}}
            }))
            .unwrap();

        assert_eq!(
            expanded["properties"]["port"],
            json!({"$ref": "#/$defs/c814f144-cb8d-5269-93c4-da79a8b2f6cd", "description": "port"})
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn property_named_like_a_keyword_is_not_expanded() {
        let cache = SchemaCache::new();
        let mut expander = SchemaExpander::new(&cache);
        let schema = json!({"properties": {"dynamic": {"type": "string"}}, "enum": [{"dynamic": 1}]});
        assert_eq!(expander.expand(&schema).unwrap(), schema);
        assert!(cache.is_empty());
    }

    #[test]
    fn nested_fragments_are_dependencies_not_uses() {
        let cache = SchemaCache::new();
        let mut expander = SchemaExpander::new(&cache);
        let inner = json!({"type": "number"});
        let outer = json!({"type": "object", "properties": {"n": {"dynamic": inner}}});
        expander.reference(&outer).unwrap();

        assert_eq!(expander.uses().len(), 1);
        assert_eq!(cache.len(), 2);
        let composite = cache.get(&fragment_id(&outer)).unwrap();
        assert_eq!(composite.deps, vec![fragment_id(&inner)]);
    }

    #[test]
    fn non_schema_fragment_is_rejected() {
        let cache = SchemaCache::new();
        let mut expander = SchemaExpander::new(&cache);
        assert!(matches!(
            expander.reference(&json!(42)),
            Err(DollarError::SchemaCompile { .. })
        ));
    }
}
