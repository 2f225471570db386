//! Resolution engine - eager, residual-producing evaluation
//!
//! `resolve(node, params)` inlines every keyword whose controlling parameter
//! is present and leaves the rest as residual nodes in their original shape,
//! so the output can be resolved again once more parameters are known:
//!
//! ```text
//! resolve(resolve(n, p1), p2) == resolve(n, p1 ∪ p2)
//! ```
//!
//! `None` stands for an undefined result (a `$guard` with no surviving pair,
//! a `$switch` with no matching case). Inside objects the key is dropped,
//! inside arrays it becomes `null`. A branch value of a residual `$guard` or
//! `$switch` that is undefined is written as `{"$guard": []}`, which resolves
//! to undefined again on the next pass.
//!
//! `$function` is never invoked here: the ambient params are folded into
//! its payload for whoever owns the function registry.

use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::error::Result;
use crate::node::{Case, Node, DEFAULT_BRANCH, FUNCTION, GUARD, PARAM, SWITCH, TEMPLATE};
use crate::params::{truthy, Lookup, Params};
use crate::template::{self, Substitution};

/// Resolve a parsed node against `params`
pub fn resolve(node: &Node, params: &Params) -> Option<Value> {
    Resolver { params }.resolve(node)
}

/// Parse `value` and resolve it against `params`
pub fn resolve_value(value: &Value, params: &Params) -> Result<Option<Value>> {
    let node = Node::parse(value)?;
    Ok(resolve(&node, params))
}

/// Build a config with predefined params
///
/// `params` is a (possibly nested) JSON object; it is flattened before use so
/// both `a.b` and nested `{a: {b}}` lookups succeed.
pub fn build(config: &Value, params: &Value) -> Result<Option<Value>> {
    resolve_value(config, &Params::from_value(params))
}

struct Resolver<'p> {
    params: &'p Params,
}

impl Resolver<'_> {
    fn resolve(&self, node: &Node) -> Option<Value> {
        match node {
            Node::Scalar(value) => Some(value.clone()),
            Node::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item).unwrap_or(Value::Null))
                    .collect(),
            )),
            Node::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, child) in entries {
                    if let Some(value) = self.resolve(child) {
                        map.insert(key.clone(), value);
                    }
                }
                Some(Value::Object(map))
            }
            Node::Param { path, default } => self.param(node, path, default.as_deref()),
            Node::Template(text) => Some(self.template(text)),
            Node::Guard(pairs) => self.guard(pairs),
            Node::Switch {
                discriminator,
                cases,
            } => self.switch(discriminator, cases),
            Node::Function { name, extra } => Some(self.function(name, extra.as_ref())),
        }
    }

    /// Resolve a branch value that is embedded in a residual
    fn resolve_branch(&self, node: &Node) -> Value {
        self.resolve(node).unwrap_or_else(undefined)
    }

    fn param(&self, node: &Node, path: &str, default: Option<&Node>) -> Option<Value> {
        trace!(keyword = PARAM, path, "dispatch");
        match (self.params.lookup(path), default) {
            // A looked-up value is final, never re-read as a DSL node
            (Lookup::Found(value), _) => Some(value.clone()),
            (Lookup::Undefined, Some(default)) | (Lookup::Absent, Some(default)) => {
                self.resolve(default)
            }
            (Lookup::Undefined, None) => None,
            (Lookup::Absent, None) => {
                debug!(path, "residual $param");
                Some(node.to_value())
            }
        }
    }

    fn template(&self, text: &str) -> Value {
        trace!(keyword = TEMPLATE, "dispatch");
        let substitution = template::substitute(text, |path| match self.params.lookup(path) {
            Lookup::Found(value) => Some(template::coerce(Some(value))),
            Lookup::Undefined => Some(template::coerce(None)),
            Lookup::Absent => None,
        });
        match substitution {
            Substitution::Complete(text) => Value::String(text),
            Substitution::Partial(text) => {
                debug!(template = %text, "residual $template");
                json!({ TEMPLATE: text })
            }
        }
    }

    fn guard(&self, pairs: &[(String, Node)]) -> Option<Value> {
        trace!(keyword = GUARD, pairs = pairs.len(), "dispatch");
        let mut kept: Vec<(&str, Value)> = Vec::new();

        for (condition, value) in pairs {
            let decided = if condition == DEFAULT_BRANCH {
                true
            } else {
                match self.params.lookup(condition) {
                    Lookup::Found(test) if truthy(test) => true,
                    // Present and falsy: this pair can never win
                    Lookup::Found(_) | Lookup::Undefined => continue,
                    Lookup::Absent => false,
                }
            };

            if decided {
                // Nothing undecided before it: the guard collapses to this value
                if kept.is_empty() {
                    return self.resolve(value);
                }
                kept.push((DEFAULT_BRANCH, self.resolve_branch(value)));
                break;
            }
            kept.push((condition.as_str(), self.resolve_branch(value)));
        }

        if kept.is_empty() {
            return None;
        }

        debug!(pairs = kept.len(), "residual $guard");
        Some(json!({
            GUARD: kept
                .into_iter()
                .map(|(condition, value)| json!([condition, value]))
                .collect::<Vec<_>>()
        }))
    }

    fn switch(&self, discriminator: &str, cases: &[(Case, Node)]) -> Option<Value> {
        trace!(keyword = SWITCH, discriminator, "dispatch");
        let test = match self.params.lookup(discriminator) {
            Lookup::Found(value) => Some(value),
            Lookup::Undefined => None,
            Lookup::Absent => {
                debug!(discriminator, "residual $switch");
                let cases: Vec<Value> = cases
                    .iter()
                    .map(|(case, value)| json!([case.to_value(), self.resolve_branch(value)]))
                    .collect();
                return Some(json!({ SWITCH: [discriminator, cases] }));
            }
        };

        cases
            .iter()
            .find(|(case, _)| case.matches(test))
            .and_then(|(_, value)| self.resolve(value))
    }

    fn function(&self, name: &str, extra: Option<&Map<String, Value>>) -> Value {
        trace!(keyword = FUNCTION, name, "dispatch");
        json!({ FUNCTION: [name, self.params.merged_over(extra)] })
    }
}

/// A guard without pairs, the residual form of an undefined value
fn undefined() -> Value {
    json!({ GUARD: [] })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config: Value, params: Value) -> Option<Value> {
        build(&config, &params).unwrap()
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(run(json!(1), json!({})), Some(json!(1)));
        assert_eq!(run(json!("x"), json!({"x": 1})), Some(json!("x")));
        assert_eq!(run(json!(null), json!({})), Some(json!(null)));
    }

    #[test]
    fn undefined_values_are_dropped_from_objects() {
        let config = json!({"a": {"$guard": [["x", 1]]}, "b": [{"$guard": [["x", 1]]}]});
        let params = Params::new().with("x", json!(false));
        assert_eq!(
            resolve_value(&config, &params).unwrap(),
            Some(json!({"b": [null]}))
        );
    }

    #[test]
    fn decided_guard_keeps_undefined_branch() {
        let config = json!({"x": {"$guard": [["a", {"$guard": [["b", 1]]}]]}});
        assert_eq!(run(config, json!({"a": true, "b": false})), Some(json!({})));

        let config = json!({"$guard": [["a", {"$guard": [["b", 1]]}], ["$default", 2]]});
        assert_eq!(run(config, json!({"a": true, "b": false})), None);
    }

    #[test]
    fn residual_branches_encode_undefined() {
        let config = json!({"$switch": ["k", [["x", {"$switch": ["j", [["y", 1]]]}]]]});
        assert_eq!(
            run(config, json!({"j": "z"})),
            Some(json!({"$switch": ["k", [["x", {"$guard": []}]]]}))
        );

        let config = json!({"$guard": [["a", 1], ["b", {"$guard": [["c", 2]]}]]});
        assert_eq!(
            run(config, json!({"b": true, "c": 0})),
            Some(json!({"$guard": [["a", 1], ["$default", {"$guard": []}]]}))
        );
    }

    #[test]
    fn empty_guard_is_undefined() {
        assert_eq!(run(json!({"$guard": []}), json!({})), None);
    }

    #[test]
    fn param_value_is_not_reinterpreted() {
        let config = json!({"$param": "p"});
        let params = json!({"p": {"$param": "q"}, "q": 1});
        assert_eq!(run(config, params), Some(json!({"$param": "q"})));
    }

    #[test]
    fn param_undefined_without_default_is_undefined() {
        let params = Params::new().with_undefined("foo");
        assert_eq!(
            resolve_value(&json!({"$param": "foo"}), &params).unwrap(),
            None
        );
    }

    #[test]
    fn param_null_is_found() {
        assert_eq!(
            run(json!({"$param": ["foo", 1]}), json!({"foo": null})),
            Some(json!(null))
        );
    }

    #[test]
    fn template_undefined_renders_empty() {
        let params = Params::new().with_undefined("a").with("b", json!(2));
        assert_eq!(
            resolve_value(&json!({"$template": "[${a}|${b}]"}), &params).unwrap(),
            Some(json!("[|2]"))
        );
    }

    #[test]
    fn guard_default_stops_the_scan() {
        let config = json!({"$guard": [["$default", 1], ["a", 2]]});
        assert_eq!(run(config, json!({})), Some(json!(1)));
    }

    #[test]
    fn guard_residual_keeps_undecided_pairs() {
        let config = json!({"$guard": [["a", 1], ["b", 2], ["c", 3]]});
        assert_eq!(
            run(config, json!({"b": 0})),
            Some(json!({"$guard": [["a", 1], ["c", 3]]}))
        );
    }

    #[test]
    fn switch_set_membership() {
        let config = json!({"$switch": ["k", [[["a", "b"], 1], ["$default", 2]]]});
        assert_eq!(run(config.clone(), json!({"k": "b"})), Some(json!(1)));
        assert_eq!(run(config, json!({"k": "c"})), Some(json!(2)));
    }

    #[test]
    fn switch_without_match_is_undefined() {
        let config = json!({"$switch": ["k", [["a", 1]]]});
        assert_eq!(run(config, json!({"k": "z"})), None);
    }

    #[test]
    fn switch_undefined_discriminator_takes_default() {
        let config = json!({"$switch": ["k", [["a", 1], ["$default", 2]]]});
        let params = Params::new().with_undefined("k");
        assert_eq!(resolve_value(&config, &params).unwrap(), Some(json!(2)));
    }

    #[test]
    fn function_merges_extra_params_under_ambient() {
        let config = json!({"$function": ["f", {"a": 0, "b": 1}]});
        assert_eq!(
            run(config, json!({"a": 2})),
            Some(json!({"$function": ["f", {"a": 2, "b": 1}]}))
        );
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(build(&json!({"$switch": "k"}), &json!({})).is_err());
    }
}
