//! Composite schema for one `dynamic` fragment
//!
//! ```text
//! oneOf:
//!   - fragment, and not an object carrying a keyword key
//!   - { $param:    path | [path, R] }
//!   - { $template: string | [string, ..] }
//!   - { $guard:    [[path, R], ..] }
//!   - { $switch:   [path, [[case, R], ..]] }
//!   - { $function: name | [name, {..}] }
//! ```
//!
//! `R` is a reference back to the composite itself, so default, branch and
//! case values nest dynamic forms to any depth.

use serde_json::{json, Value};

use crate::node::{FUNCTION, GUARD, KEYWORDS, PARAM, SWITCH, TEMPLATE};

/// `$defs` pointer for a composite id
pub fn pointer(id: &str) -> String {
    format!("#/$defs/{}", id)
}

/// Build the composite for an already expanded fragment
pub fn composite(fragment: Value, id: &str) -> Value {
    let recurse = json!({ "$ref": pointer(id) });

    json!({
        "oneOf": [
            { "allOf": [fragment, not_keyword()] },
            param_shape(&recurse),
            template_shape(),
            guard_shape(&recurse),
            switch_shape(&recurse),
            function_shape(),
        ]
    })
}

fn not_keyword() -> Value {
    let any_keyword: Vec<Value> = KEYWORDS
        .iter()
        .map(|keyword| json!({ "required": [keyword] }))
        .collect();
    json!({ "not": { "type": "object", "anyOf": any_keyword } })
}

/// `{ keyword: payload }` and nothing else
fn keyword_object(keyword: &str, payload: Value) -> Value {
    json!({
        "type": "object",
        "required": [keyword],
        "additionalProperties": false,
        "properties": { keyword: payload }
    })
}

/// Exactly two items
fn tuple(first: Value, second: Value) -> Value {
    json!({
        "type": "array",
        "prefixItems": [first, second],
        "minItems": 2,
        "maxItems": 2
    })
}

fn path() -> Value {
    json!({ "type": "string" })
}

fn param_shape(recurse: &Value) -> Value {
    keyword_object(
        PARAM,
        json!({ "oneOf": [path(), tuple(path(), recurse.clone())] }),
    )
}

fn template_shape() -> Value {
    keyword_object(
        TEMPLATE,
        json!({
            "oneOf": [
                { "type": "string" },
                { "type": "array", "items": { "type": "string" } }
            ]
        }),
    )
}

/// An empty pair list is allowed: it is how a residual writes an
/// undefined branch value
fn guard_shape(recurse: &Value) -> Value {
    keyword_object(
        GUARD,
        json!({
            "type": "array",
            "items": tuple(path(), recurse.clone())
        }),
    )
}

fn switch_shape(recurse: &Value) -> Value {
    let scalar = json!({ "type": ["string", "number", "boolean", "null"] });
    let case = json!({ "anyOf": [scalar, { "type": "array", "items": scalar }] });
    let cases = json!({
        "type": "array",
        "items": tuple(case, recurse.clone())
    });
    keyword_object(SWITCH, tuple(path(), cases))
}

fn function_shape() -> Value {
    keyword_object(
        FUNCTION,
        json!({ "oneOf": [path(), tuple(path(), json!({ "type": "object" }))] }),
    )
}
