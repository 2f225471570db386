//! Config nodes and keyword dispatch
//!
//! A node is a keyword node iff it is an object carrying one of the
//! recognized keys. The keyword payload is parsed once into a variant of
//! [`Node`]; the engines then dispatch with an exhaustive `match` instead of
//! probing string keys at every visit.
//!
//! ```text
//! {"$param": "a"}                         → Node::Param
//! {"$param": ["a", <node>]}               → Node::Param { default }
//! {"$template": "${a}/x"} | [..strings]   → Node::Template
//! {"$guard": [[cond, <node>], ..]}        → Node::Guard
//! {"$switch": [path, [[case, <node>], ..]]} → Node::Switch
//! {"$function": name | [name, {..}]}      → Node::Function
//! ```

use serde_json::{json, Map, Value};

use crate::error::{DollarError, Result};

pub const PARAM: &str = "$param";
pub const TEMPLATE: &str = "$template";
pub const GUARD: &str = "$guard";
pub const SWITCH: &str = "$switch";
pub const FUNCTION: &str = "$function";

/// Reserved keys, in dispatch order
pub const KEYWORDS: [&str; 5] = [PARAM, TEMPLATE, GUARD, SWITCH, FUNCTION];

/// Catch-all condition of `$guard` and case of `$switch`
pub const DEFAULT_BRANCH: &str = "$default";

/// A parsed config node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Any non-container value
    Scalar(Value),
    Array(Vec<Node>),
    /// Plain object, entries in document order
    Object(Vec<(String, Node)>),
    Param {
        path: String,
        /// `None` for the string form, `Some` for `[path, default]`
        default: Option<Box<Node>>,
    },
    /// Template text (array form is joined at parse time)
    Template(String),
    Guard(Vec<(String, Node)>),
    Switch {
        discriminator: String,
        cases: Vec<(Case, Node)>,
    },
    Function {
        name: String,
        extra: Option<Map<String, Value>>,
    },
}

/// A `$switch` case label
#[derive(Debug, Clone, PartialEq)]
pub enum Case {
    /// `'$default'`, matches anything
    Default,
    /// Matches a single value
    Value(Value),
    /// Matches any member of the set
    OneOf(Vec<Value>),
}

impl Case {
    fn parse(value: &Value) -> Case {
        match value {
            Value::String(s) if s == DEFAULT_BRANCH => Case::Default,
            Value::Array(items) => Case::OneOf(items.clone()),
            other => Case::Value(other.clone()),
        }
    }

    /// Whether this case accepts `test` (`None` = undefined)
    pub fn matches(&self, test: Option<&Value>) -> bool {
        match (self, test) {
            (Case::Default, _) => true,
            (Case::Value(expected), Some(actual)) => expected == actual,
            (Case::OneOf(options), Some(actual)) => options.contains(actual),
            (_, None) => false,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Case::Default => Value::String(DEFAULT_BRANCH.to_string()),
            Case::Value(value) => value.clone(),
            Case::OneOf(options) => Value::Array(options.clone()),
        }
    }
}

impl Node {
    /// Parse a JSON value into a node tree
    ///
    /// Fails with [`DollarError::InvalidKeyword`] when a keyword payload does
    /// not have the documented shape.
    pub fn parse(value: &Value) -> Result<Node> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(Node::parse)
                .collect::<Result<Vec<_>>>()
                .map(Node::Array),
            Value::Object(map) => match KEYWORDS.iter().find(|k| map.contains_key(**k)) {
                Some(&keyword) => parse_keyword(keyword, &map[keyword]),
                None => map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Node::parse(v)?)))
                    .collect::<Result<Vec<_>>>()
                    .map(Node::Object),
            },
            scalar => Ok(Node::Scalar(scalar.clone())),
        }
    }

    /// The keyword this node carries, if any
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Node::Scalar(_) | Node::Array(_) | Node::Object(_) => None,
            Node::Param { .. } => Some(PARAM),
            Node::Template(_) => Some(TEMPLATE),
            Node::Guard(_) => Some(GUARD),
            Node::Switch { .. } => Some(SWITCH),
            Node::Function { .. } => Some(FUNCTION),
        }
    }

    /// Whether this node or any descendant carries a keyword
    pub fn is_dynamic(&self) -> bool {
        match self {
            Node::Scalar(_) => false,
            Node::Array(items) => items.iter().any(Node::is_dynamic),
            Node::Object(entries) => entries.iter().any(|(_, n)| n.is_dynamic()),
            _ => true,
        }
    }

    /// Render the node back into its document shape
    pub fn to_value(&self) -> Value {
        match self {
            Node::Scalar(value) => value.clone(),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, n)| (k.clone(), n.to_value()))
                    .collect(),
            ),
            Node::Param {
                path,
                default: None,
            } => json!({ PARAM: path }),
            Node::Param {
                path,
                default: Some(default),
            } => json!({ PARAM: [path, default.to_value()] }),
            Node::Template(text) => json!({ TEMPLATE: text }),
            Node::Guard(pairs) => json!({
                GUARD: pairs
                    .iter()
                    .map(|(cond, n)| json!([cond, n.to_value()]))
                    .collect::<Vec<_>>()
            }),
            Node::Switch {
                discriminator,
                cases,
            } => json!({
                SWITCH: [
                    discriminator,
                    cases
                        .iter()
                        .map(|(case, n)| json!([case.to_value(), n.to_value()]))
                        .collect::<Vec<_>>()
                ]
            }),
            Node::Function { name, extra: None } => json!({ FUNCTION: name }),
            Node::Function {
                name,
                extra: Some(extra),
            } => json!({ FUNCTION: [name, extra] }),
        }
    }
}

impl TryFrom<&Value> for Node {
    type Error = DollarError;

    fn try_from(value: &Value) -> Result<Self> {
        Node::parse(value)
    }
}

fn invalid(keyword: &'static str, reason: impl Into<String>) -> DollarError {
    DollarError::InvalidKeyword {
        keyword,
        reason: reason.into(),
    }
}

fn parse_keyword(keyword: &'static str, payload: &Value) -> Result<Node> {
    match keyword {
        PARAM => parse_param(payload),
        TEMPLATE => parse_template(payload),
        GUARD => parse_guard(payload),
        SWITCH => parse_switch(payload),
        FUNCTION => parse_function(payload),
        _ => Err(invalid(keyword, "unknown keyword")),
    }
}

fn parse_param(payload: &Value) -> Result<Node> {
    match payload {
        Value::String(path) => Ok(Node::Param {
            path: path.clone(),
            default: None,
        }),
        Value::Array(items) => match items.as_slice() {
            [Value::String(path), default] => Ok(Node::Param {
                path: path.clone(),
                default: Some(Box::new(Node::parse(default)?)),
            }),
            _ => Err(invalid(PARAM, "expected [path, default]")),
        },
        _ => Err(invalid(PARAM, "expected a path string or [path, default]")),
    }
}

fn parse_template(payload: &Value) -> Result<Node> {
    match payload {
        Value::String(text) => Ok(Node::Template(text.clone())),
        Value::Array(parts) => parts
            .iter()
            .map(|part| {
                part.as_str()
                    .ok_or_else(|| invalid(TEMPLATE, "array items must be strings"))
            })
            .collect::<Result<Vec<_>>>()
            .map(|parts| Node::Template(parts.concat())),
        _ => Err(invalid(TEMPLATE, "expected a string or an array of strings")),
    }
}

/// `[label, value]` pair shared by `$guard` and `$switch`
fn pair<'v>(keyword: &'static str, item: &'v Value) -> Result<(&'v Value, Node)> {
    match item.as_array().map(Vec::as_slice) {
        Some([label, value]) => Ok((label, Node::parse(value)?)),
        _ => Err(invalid(keyword, "expected [condition, value] pairs")),
    }
}

fn parse_guard(payload: &Value) -> Result<Node> {
    let items = payload
        .as_array()
        .ok_or_else(|| invalid(GUARD, "expected an array of pairs"))?;
    items
        .iter()
        .map(|item| {
            let (label, node) = pair(GUARD, item)?;
            let condition = label
                .as_str()
                .ok_or_else(|| invalid(GUARD, "condition must be a path string"))?;
            Ok((condition.to_string(), node))
        })
        .collect::<Result<Vec<_>>>()
        .map(Node::Guard)
}

fn parse_switch(payload: &Value) -> Result<Node> {
    let (discriminator, cases) = match payload.as_array().map(Vec::as_slice) {
        Some([Value::String(path), Value::Array(cases)]) => (path, cases),
        _ => return Err(invalid(SWITCH, "expected [path, [[case, value], ..]]")),
    };
    let cases = cases
        .iter()
        .map(|item| {
            let (label, node) = pair(SWITCH, item)?;
            Ok((Case::parse(label), node))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Node::Switch {
        discriminator: discriminator.clone(),
        cases,
    })
}

fn parse_function(payload: &Value) -> Result<Node> {
    match payload {
        Value::String(name) => Ok(Node::Function {
            name: name.clone(),
            extra: None,
        }),
        Value::Array(items) => match items.as_slice() {
            [Value::String(name), Value::Object(extra)] => Ok(Node::Function {
                name: name.clone(),
                extra: Some(extra.clone()),
            }),
            _ => Err(invalid(FUNCTION, "expected [name, {params}]")),
        },
        _ => Err(invalid(FUNCTION, "expected a name or [name, {params}]")),
    }
}
