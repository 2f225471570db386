//! Composite schema cache
//!
//! Content-addressed store of generated composite schemas.
//!
//! ## Design
//!
//! - Keyed by the fragment id (uuid v5 of the canonical fragment JSON)
//! - Thread-safe via DashMap, append-only, no eviction
//! - Each entry records the ids its composite refers to, so a validator can
//!   gather the full `$defs` closure without re-expanding anything
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dollar_config::schema::{SchemaCache, SchemaExpander};
//!
//! let cache = SchemaCache::new();
//! let mut expander = SchemaExpander::new(&cache);
//! let reference = expander.reference(&json!({"type": "number"}))?;
//! ```

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Generated composite schema for one fragment
#[derive(Debug, Clone)]
pub struct CachedComposite {
    /// Composite schema (fragment OR one of the keyword shapes)
    pub schema: Arc<Value>,

    /// Ids of other composites referenced from inside the fragment
    pub deps: Vec<String>,
}

/// Statistics about the schema cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of distinct fragments compiled
    pub composites: usize,

    /// Number of dependency edges between composites
    pub edges: usize,
}

/// Thread-safe composite schema cache
pub struct SchemaCache {
    cache: DashMap<String, CachedComposite>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }

    /// Get a cached composite (cloned handle, no lock held)
    pub fn get(&self, id: &str) -> Option<CachedComposite> {
        self.cache.get(id).map(|entry| entry.value().clone())
    }

    /// Store a composite unless one is already registered under `id`
    ///
    /// Ids are content hashes, so a racing insert carries the same schema
    /// and the first one wins.
    pub fn insert(&self, id: String, composite: CachedComposite) {
        self.cache.entry(id).or_insert(composite);
    }

    /// Clear all cached composites
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            composites: self.cache.len(),
            edges: self.cache.iter().map(|e| e.value().deps.len()).sum(),
        }
    }

    /// Collect `roots` and every composite reachable from them as a
    /// `$defs` map
    ///
    /// Ids missing from the cache are skipped; the validator reports them
    /// as unresolvable references when compiling.
    pub fn definitions<'a>(&self, roots: impl IntoIterator<Item = &'a String>) -> Map<String, Value> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<String> = roots.into_iter().cloned().collect();
        let mut defs = BTreeMap::new();

        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(composite) = self.get(&id) {
                pending.extend(composite.deps.iter().cloned());
                defs.insert(id, (*composite.schema).clone());
            }
        }

        defs.into_iter().collect()
    }
}

/// Process-wide cache used by [`crate::schema::DynamicValidator::new`]
pub static SCHEMA_CACHE: Lazy<SchemaCache> = Lazy::new(SchemaCache::new);

// ============================================================================
// TESTS
// ============================================================================
