//! Parameter set used by resolution and binding
//!
//! Params keep the nested object they were built from plus a flattened
//! index of every dot-path (see [`flatten`]), so `$param: server.port`
//! answers both `{"server": {"port": 80}}` and `{"server.port": 80}`.
//!
//! JSON has no `undefined`; a key can still be declared present-but-undefined
//! with [`Params::with_undefined`]. Such a key decides `$guard` and `$switch`
//! (as a falsy value) but makes a defaulted `$param` fall back to its default.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};

use crate::path;

/// Path separator used when flattening nested keys
pub const DELIMITER: char = '.';

/// Outcome of looking a path up in [`Params`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// Present with a value (possibly `null`)
    Found(&'a Value),
    /// Present but explicitly undefined
    Undefined,
    /// Not present at all
    Absent,
}

impl<'a> Lookup<'a> {
    /// True for `Found` and `Undefined`
    pub fn is_present(&self) -> bool {
        !matches!(self, Lookup::Absent)
    }

    /// The value, if one was found
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Immutable parameter set for one resolution or binding pass
#[derive(Debug, Clone)]
pub struct Params {
    root: Value,
    flat: FxHashMap<String, Value>,
    undefined: FxHashSet<String>,
}

impl Params {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
            flat: FxHashMap::default(),
            undefined: FxHashSet::default(),
        }
    }

    /// Build params from a JSON object; anything else yields an empty set
    pub fn from_value(value: &Value) -> Self {
        let mut params = Self::new();
        if let Value::Object(map) = value {
            for (key, item) in map {
                params.insert(key.clone(), item.clone());
            }
        }
        params
    }

    /// Insert (or replace) a top-level parameter
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        // Drop stale flattened entries from a previous value under this key
        let prefix = format!("{}{}", key, DELIMITER);
        self.undefined.retain(|k| k != &key && !k.starts_with(&prefix));
        self.flat.retain(|k, _| k != &key && !k.starts_with(&prefix));
        assign(&mut self.flat, "", &key, &value);
        if let Value::Object(root) = &mut self.root {
            root.insert(key, value);
        }
    }

    /// Builder form of [`Params::insert`]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Declare `key` as present but undefined
    pub fn with_undefined(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.forget(&key);
        self.undefined.insert(key);
        self
    }

    /// Remove every value reachable under `key`: its flattened descendants,
    /// and the entry itself inside the root and inside flattened ancestors
    fn forget(&mut self, key: &str) {
        let prefix = format!("{}{}", key, DELIMITER);
        self.flat.retain(|k, _| k != key && !k.starts_with(&prefix));
        self.undefined.retain(|k| !k.starts_with(&prefix));

        let segments: Vec<&str> = key.split(DELIMITER).collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        if let Value::Object(root) = &mut self.root {
            root.remove(key);
        }
        if let Some(Value::Object(parent)) = path::find_mut(&mut self.root, parents) {
            parent.remove(*last);
        }
        for depth in 1..segments.len() {
            let ancestor = segments[..depth].join(".");
            if let Some(value) = self.flat.get_mut(&ancestor) {
                if let Some(Value::Object(parent)) = path::find_mut(value, &parents[depth..]) {
                    parent.remove(*last);
                }
            }
        }
    }

    /// Look up a dot-path
    ///
    /// Flattened keys are consulted first; array indices (`items.0`) fall
    /// back to a strict walk of the nested object.
    pub fn lookup(&self, path: &str) -> Lookup<'_> {
        if self.undefined.contains(path) {
            return Lookup::Undefined;
        }
        if let Some(value) = self.flat.get(path) {
            return Lookup::Found(value);
        }
        let segments: Vec<&str> = path.split(DELIMITER).collect();
        match path::find(&self.root, &segments) {
            Some(value) => Lookup::Found(value),
            None => Lookup::Absent,
        }
    }

    /// Whether `path` is present (found or explicitly undefined)
    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_present()
    }

    /// The nested parameter object
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Merge `extra` under the ambient params; ambient keys win on collision
    pub fn merged_over(&self, extra: Option<&Map<String, Value>>) -> Value {
        let mut merged = extra.cloned().unwrap_or_default();
        if let Value::Object(root) = &self.root {
            for (key, value) in root {
                merged.insert(key.clone(), value.clone());
            }
        }
        Value::Object(merged)
    }

    /// Combine two parameter sets; `other` wins on collision
    pub fn merge(&self, other: &Params) -> Params {
        let mut merged = self.clone();
        if let Value::Object(root) = &other.root {
            for (key, value) in root {
                merged.insert(key.clone(), value.clone());
            }
        }
        for key in &other.undefined {
            merged = merged.with_undefined(key.clone());
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty() && self.undefined.is_empty()
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Params::from_value(&value)
    }
}

/// Recursively flatten object keys
///
/// Unlike a plain flattening, nested objects are flattened AND kept:
/// `{"a": {"b": 1}}` → `{"a": {"b": 1}, "a.b": 1}`. Arrays are leaves.
pub fn flatten(object: &Map<String, Value>) -> Map<String, Value> {
    let mut index = FxHashMap::default();
    for (key, value) in object {
        assign(&mut index, "", key, value);
    }
    index.into_iter().collect()
}

fn assign(target: &mut FxHashMap<String, Value>, prefix: &str, key: &str, item: &Value) {
    let new_key = format!("{}{}", prefix, key);
    if let Value::Object(children) = item {
        let child_prefix = format!("{}{}", new_key, DELIMITER);
        for (child_key, child) in children {
            assign(target, &child_prefix, child_key, child);
        }
    }
    target.insert(new_key, item.clone());
}

/// JavaScript-style truthiness, used by `$guard` conditions
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_keeps_intermediate_objects() {
        let object = json!({"a": {"b": {"c": 1}}, "d": [1, 2]});
        let flat = flatten(object.as_object().unwrap());
        assert_eq!(flat.get("a"), Some(&json!({"b": {"c": 1}})));
        assert_eq!(flat.get("a.b"), Some(&json!({"c": 1})));
        assert_eq!(flat.get("a.b.c"), Some(&json!(1)));
        assert_eq!(flat.get("d"), Some(&json!([1, 2])));
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn flatten_keeps_literal_dotted_keys() {
        let object = json!({"a.b": 1});
        let flat = flatten(object.as_object().unwrap());
        assert_eq!(flat.get("a.b"), Some(&json!(1)));
    }

    #[test]
    fn lookup_nested_and_flat() {
        let params = Params::from_value(&json!({"foo": {"bar": 1}, "x.y": 2}));
        assert_eq!(params.lookup("foo.bar"), Lookup::Found(&json!(1)));
        assert_eq!(params.lookup("x.y"), Lookup::Found(&json!(2)));
        assert_eq!(params.lookup("foo.baz"), Lookup::Absent);
    }

    #[test]
    fn lookup_array_index() {
        let params = Params::from_value(&json!({"items": ["a", "b"]}));
        assert_eq!(params.lookup("items.1"), Lookup::Found(&json!("b")));
    }

    #[test]
    fn null_is_found() {
        let params = Params::new().with("foo", Value::Null);
        assert_eq!(params.lookup("foo"), Lookup::Found(&Value::Null));
    }

    #[test]
    fn undefined_is_present_without_value() {
        let params = Params::new().with_undefined("foo");
        assert_eq!(params.lookup("foo"), Lookup::Undefined);
        assert!(params.contains("foo"));
        assert_eq!(params.as_value(), &json!({}));
    }

    #[test]
    fn insert_replaces_stale_flat_entries() {
        let mut params = Params::new().with("a", json!({"b": 1}));
        params.insert("a", json!(2));
        assert_eq!(params.lookup("a.b"), Lookup::Absent);
        assert_eq!(params.lookup("a"), Lookup::Found(&json!(2)));
    }

    #[test]
    fn undefined_hides_nested_entries() {
        let params = Params::new().with("a", json!({"b": 1})).with_undefined("a");
        assert_eq!(params.lookup("a"), Lookup::Undefined);
        assert_eq!(params.lookup("a.b"), Lookup::Absent);
        assert_eq!(params.as_value(), &json!({}));
    }

    #[test]
    fn undefined_nested_key_is_removed_from_ancestors() {
        let params = Params::new()
            .with("a", json!({"b": {"c": 1}, "d": 2}))
            .with_undefined("a.b");
        assert_eq!(params.lookup("a.b"), Lookup::Undefined);
        assert_eq!(params.lookup("a.b.c"), Lookup::Absent);
        assert_eq!(params.lookup("a"), Lookup::Found(&json!({"d": 2})));
        assert_eq!(params.as_value(), &json!({"a": {"d": 2}}));
    }

    #[test]
    fn merge_applies_undefined_to_nested_entries() {
        let base = Params::new().with("a", json!({"b": 1}));
        let merged = base.merge(&Params::new().with_undefined("a"));
        assert_eq!(merged.lookup("a"), Lookup::Undefined);
        assert_eq!(merged.lookup("a.b"), Lookup::Absent);
    }

    #[test]
    fn insert_clears_nested_undefined_keys() {
        let params = Params::new().with_undefined("a.b").with("a", json!({"b": 1}));
        assert_eq!(params.lookup("a.b"), Lookup::Found(&json!(1)));
    }

    #[test]
    fn ambient_params_win_over_extra() {
        let params = Params::from_value(&json!({"a": 1}));
        let extra = json!({"a": 0, "b": 2});
        assert_eq!(
            params.merged_over(extra.as_object()),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
    }
}
