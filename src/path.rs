//! Path accessor
//!
//! Supports:
//! - a.b.c (dot notation)
//! - a[0].b (array index)
//! - a.0.b (numeric segment, same as a[0].b)
//!
//! Segments are kept as strings: a numeric segment indexes arrays and is a
//! plain key on objects, so `{"0": x}` and `[x]` both answer to `0`.

use serde_json::Value;

use crate::error::{DollarError, Result};

/// Key used by plain objects as a fallback for missing properties
pub const DEFAULT_KEY: &str = "$default";

/// Parse a dot-delimited path into segments
///
/// Examples:
/// - "server.port" → ["server", "port"]
/// - "items[0].name" → ["items", "0", "name"]
/// - "" → [] (the root)
pub fn parse(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Ok(vec![]);
    }

    let invalid = || DollarError::InvalidPath {
        path: path.to_string(),
    };

    let mut segments = Vec::new();

    for part in path.split('.') {
        if part.is_empty() {
            return Err(invalid());
        }

        match part.find('[') {
            Some(bracket_pos) => {
                let field = &part[..bracket_pos];
                if !field.is_empty() {
                    segments.push(field.to_string());
                }

                // One or more [n] suffixes: a[0][1]
                let mut rest = &part[bracket_pos..];
                while let Some(stripped) = rest.strip_prefix('[') {
                    let close = stripped.find(']').ok_or_else(invalid)?;
                    let index = &stripped[..close];
                    index.parse::<usize>().map_err(|_| invalid())?;
                    segments.push(index.to_string());
                    rest = &stripped[close + 1..];
                }
                if !rest.is_empty() {
                    return Err(invalid());
                }
            }
            None => segments.push(part.to_string()),
        }
    }

    Ok(segments)
}

/// Take one step into a container value
pub fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Like [`step`], but a plain object missing `segment` answers with its
/// `$default` property when it has one
pub fn step_or_default<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment).or_else(|| map.get(DEFAULT_KEY)),
        _ => step(value, segment),
    }
}

/// Walk `segments` from `value`, short-circuiting on `null`
///
/// A `null` met before the last segment is returned as-is, so
/// `get({"a": null}, "a.b")` is `Some(null)`, while a missing key is `None`.
pub fn get<'v, S: AsRef<str>>(value: &'v Value, segments: &[S]) -> Option<&'v Value> {
    let mut current = value;
    for segment in segments {
        if current.is_null() {
            return Some(current);
        }
        current = step_or_default(current, segment.as_ref())?;
    }
    Some(current)
}

/// Strict lookup: every segment must exist, no `null` short-circuit and no
/// `$default` fallback
pub fn find<'v, S: AsRef<str>>(value: &'v Value, segments: &[S]) -> Option<&'v Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| step(current, segment.as_ref()))
}

/// Mutable counterpart of [`find`]
pub fn find_mut<'v, S: AsRef<str>>(value: &'v mut Value, segments: &[S]) -> Option<&'v mut Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment.as_ref())?,
            Value::Array(items) => {
                let index = segment.as_ref().parse::<usize>().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Join a parent key and a child segment into a dotted path
pub fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", parent, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_simple_path() {
        assert_eq!(parse("a.b.c").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_with_array_index() {
        assert_eq!(parse("items[0].name").unwrap(), vec!["items", "0", "name"]);
        assert_eq!(parse("grid[1][2]").unwrap(), vec!["grid", "1", "2"]);
    }

    #[test]
    fn parse_root() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_empty_segment() {
        assert!(matches!(
            parse("a..b"),
            Err(DollarError::InvalidPath { .. })
        ));
        assert!(parse("a[x]").is_err());
        assert!(parse("a[0]b").is_err());
    }

    #[test]
    fn get_nested_value() {
        let value = json!({"foo": {"bar": "baz"}});
        assert_eq!(get(&value, &["foo", "bar"]), Some(&json!("baz")));
    }

    #[test]
    fn get_numeric_segment() {
        let value = json!({"items": ["first", "second"]});
        assert_eq!(get(&value, &["items", "1"]), Some(&json!("second")));
        assert_eq!(get(&value, &["items", "9"]), None);
    }

    #[test]
    fn get_short_circuits_on_null() {
        let value = json!({"foo": null});
        assert_eq!(get(&value, &["foo", "bar"]), Some(&Value::Null));
    }

    #[test]
    fn get_missing_intermediate() {
        let value = json!({});
        assert_eq!(get(&value, &["foo", "bar"]), None);
    }

    #[test]
    fn get_falls_back_to_default_key() {
        let value = json!({"foo": {"$default": "oops", "bar": "baz"}});
        assert_eq!(get(&value, &["foo", "whatever"]), Some(&json!("oops")));
        assert_eq!(get(&value, &["foo", "bar"]), Some(&json!("baz")));
    }

    #[test]
    fn find_is_strict() {
        let value = json!({"foo": null, "bar": {"$default": 1}});
        assert_eq!(find(&value, &["foo", "x"]), None);
        assert_eq!(find(&value, &["bar", "x"]), None);
        assert_eq!(find(&value, &["foo"]), Some(&Value::Null));
    }

    #[test]
    fn find_mut_updates_in_place() {
        let mut value = json!({"a": [1, {"b": 2}]});
        *find_mut(&mut value, &["a", "1", "b"]).unwrap() = json!(3);
        assert_eq!(value, json!({"a": [1, {"b": 3}]}));
    }

    #[test]
    fn join_paths() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "0"), "a.0");
    }
}
