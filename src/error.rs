//! Error types with fix suggestions
//!
//! Error code ranges:
//! - DOLLAR-010-019: Keyword payload errors
//! - DOLLAR-020-029: Binding errors
//! - DOLLAR-030-039: Function registry errors
//! - DOLLAR-040-049: Path errors
//! - DOLLAR-050-059: Schema errors
//! - DOLLAR-060-069: Loader errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DollarError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// A single schema violation, located by JSON pointer into the instance
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// JSON pointer to the offending value (e.g. "/server/port")
    pub path: String,
    /// Human-readable message from the validator
    pub message: String,
}

fn format_schema_errors(errors: &[SchemaError]) -> String {
    match errors {
        [] => "no errors".to_string(),
        [single] => format!("[{}] {}", single.path, single.message),
        _ => format!(
            "{} errors: {}",
            errors.len(),
            errors
                .iter()
                .map(|e| format!("[{}] {}", e.path, e.message))
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}

#[derive(Error, Debug)]
pub enum DollarError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Keyword payload errors (DOLLAR-010 to DOLLAR-019)
    // ─────────────────────────────────────────────────────────────
    #[error("DOLLAR-010: Invalid {keyword} payload: {reason}")]
    InvalidKeyword {
        keyword: &'static str,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Binding errors (DOLLAR-020 to DOLLAR-029)
    // ─────────────────────────────────────────────────────────────
    #[error("DOLLAR-020: Circular reference while evaluating '{key}'")]
    CircularReference { key: String },

    // ─────────────────────────────────────────────────────────────
    // Function registry errors (DOLLAR-030 to DOLLAR-039)
    // ─────────────────────────────────────────────────────────────
    #[error("DOLLAR-030: Function '{name}' is not registered")]
    UnknownFunction { name: String },

    #[error("DOLLAR-031: Function '{name}' failed: {reason}")]
    FunctionFailed { name: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Path errors (DOLLAR-040 to DOLLAR-049)
    // ─────────────────────────────────────────────────────────────
    #[error("DOLLAR-040: Invalid path syntax: '{path}'")]
    InvalidPath { path: String },

    #[error("DOLLAR-041: Cannot assign '{path}': no object or array to hold it")]
    NotWritable { path: String },

    // ─────────────────────────────────────────────────────────────
    // Schema errors (DOLLAR-050 to DOLLAR-059)
    // ─────────────────────────────────────────────────────────────
    #[error("DOLLAR-050: Failed to compile schema: {reason}")]
    SchemaCompile { reason: String },

    #[error("DOLLAR-051: Unsupported schema draft '{draft}' (dynamic values need draft 2020-12)")]
    UnsupportedDraft { draft: String },

    #[error("DOLLAR-052: Schema validation failed: {}", format_schema_errors(.errors))]
    SchemaValidationFailed { errors: Vec<SchemaError> },

    // ─────────────────────────────────────────────────────────────
    // Loader errors (DOLLAR-060 to DOLLAR-069)
    // ─────────────────────────────────────────────────────────────
    #[error("DOLLAR-060: Circular $extends chain through '{path}'")]
    ExtendsCycle { path: String },

    #[error("DOLLAR-061: Invalid $extends in '{path}': {reason}")]
    InvalidExtends { path: String, reason: String },
}

impl FixSuggestion for DollarError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DollarError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            DollarError::JsonParse(_) => Some("Check JSON syntax (params may be inline JSON or @file)"),
            DollarError::Io(_) => Some("Check file path and permissions"),
            DollarError::InvalidKeyword { .. } => {
                Some("Validate the document against its schema with the `dynamic` keyword")
            }
            DollarError::CircularReference { .. } => {
                Some("Break the cycle: a $param default must not read its own key")
            }
            DollarError::UnknownFunction { .. } => {
                Some("Register the function before binding the config")
            }
            DollarError::FunctionFailed { .. } => None,
            DollarError::InvalidPath { .. } => Some("Use format: key.nested.0 or key.nested[0]"),
            DollarError::NotWritable { .. } => {
                Some("Assign to a key of an existing object or array")
            }
            DollarError::SchemaCompile { .. } => Some("Check the base schema is valid JSON Schema"),
            DollarError::UnsupportedDraft { .. } => {
                Some("Remove $schema or set it to https://json-schema.org/draft/2020-12/schema")
            }
            DollarError::SchemaValidationFailed { .. } => {
                Some("Fix the document to match the schema")
            }
            DollarError::ExtendsCycle { .. } => {
                Some("Remove the $extends entry that points back to a child config")
            }
            DollarError::InvalidExtends { .. } => {
                Some("Use `$extends: parent.yaml` or a list of paths in a mapping root")
            }
        }
    }
}
