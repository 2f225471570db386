//! Compiled validator for schemas using `dynamic`
//!
//! The expanded schema is made self-contained: every composite it reaches
//! (directly or through nested fragments) is copied into the root `$defs`,
//! and the root is pinned to draft 2020-12 (`prefixItems` is used for the
//! keyword tuples).

use jsonschema::Validator;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::cache::{SchemaCache, SCHEMA_CACHE};
use super::SchemaExpander;
use crate::error::{DollarError, Result, SchemaError};

/// Meta-schema URI of the only supported draft
pub const DRAFT_2020_12: &str = "https://json-schema.org/draft/2020-12/schema";

/// JSON Schema validator aware of dynamic config values
pub struct DynamicValidator {
    validator: Validator,
    schema: Value,
    refs: BTreeMap<String, usize>,
}

impl DynamicValidator {
    /// Compile `schema` using the process-wide composite cache
    pub fn new(schema: &Value) -> Result<Self> {
        Self::with_cache(schema, &SCHEMA_CACHE)
    }

    /// Compile `schema` against an explicit composite cache
    pub fn with_cache(schema: &Value, cache: &SchemaCache) -> Result<Self> {
        if let Some(declared) = schema.get("$schema") {
            let supported = declared
                .as_str()
                .is_some_and(|uri| uri.trim_end_matches('#') == DRAFT_2020_12);
            if !supported {
                return Err(DollarError::UnsupportedDraft {
                    draft: declared.as_str().map_or_else(|| declared.to_string(), String::from),
                });
            }
        }

        let mut expander = SchemaExpander::new(cache);
        let mut root = expander.expand(schema)?;
        let refs = expander.into_uses();

        if let Value::Object(map) = &mut root {
            map.insert("$schema".to_string(), Value::String(DRAFT_2020_12.to_string()));
            if !refs.is_empty() {
                let generated = cache.definitions(refs.keys());
                match map
                    .entry("$defs")
                    .or_insert_with(|| Value::Object(Map::new()))
                {
                    Value::Object(defs) => defs.extend(generated),
                    _ => {
                        return Err(DollarError::SchemaCompile {
                            reason: "`$defs` must be an object".to_string(),
                        })
                    }
                }
            }
        }

        let validator = Validator::new(&root).map_err(|e| DollarError::SchemaCompile {
            reason: e.to_string(),
        })?;
        debug!(composites = refs.len(), "compiled dynamic schema");

        Ok(Self {
            validator,
            schema: root,
            refs,
        })
    }

    /// Validate an instance, collecting every violation
    pub fn validate(&self, instance: &Value) -> Result<()> {
        let errors: Vec<SchemaError> = self
            .validator
            .iter_errors(instance)
            .map(|e| SchemaError {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DollarError::SchemaValidationFailed { errors })
        }
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// How many times each composite is referenced by the user schema
    pub fn refs(&self) -> &BTreeMap<String, usize> {
        &self.refs
    }

    /// The expanded, self-contained schema that was compiled
    pub fn schema(&self) -> &Value {
        &self.schema
    }
}
