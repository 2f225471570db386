//! `$template` placeholder resolver with caching
//!
//! - Tokenizes templates once and caches the result
//! - Uses Arc for zero-copy sharing of tokenized templates
//! - The cache is bounded: residual templates are new strings on every
//!   pass, so past the limit templates are tokenized without being stored
//! - Unresolved placeholders are written back verbatim, so a partially
//!   substituted template is itself a valid template for a later pass

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::ops::Range;
use std::sync::Arc;

/// Default number of tokenized templates kept by a resolver
pub const MAX_CACHED_TEMPLATES: usize = 4096;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid placeholder pattern"));

/// Token representing a parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// `${path}` placeholder; `span` covers the whole `${...}`
    Placeholder { path: String, span: Range<usize> },
}

/// Result of substituting a template
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    /// Every placeholder was replaced
    Complete(String),
    /// At least one placeholder is still `${path}`
    Partial(String),
}

/// Template tokenizer with caching
pub struct TemplateResolver {
    cache: DashMap<String, Arc<Vec<Token>>>,
    limit: usize,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self::with_limit(MAX_CACHED_TEMPLATES)
    }

    /// Resolver caching at most `limit` templates
    pub fn with_limit(limit: usize) -> Self {
        Self {
            cache: DashMap::new(),
            limit,
        }
    }

    /// Parse template into tokens (with caching)
    pub fn tokenize(&self, template: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(template) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut literal_start = 0;

        for captures in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > literal_start {
                tokens.push(Token::Literal(literal_start..whole.start()));
            }
            tokens.push(Token::Placeholder {
                path: path.as_str().to_string(),
                span: whole.range(),
            });
            literal_start = whole.end();
        }

        if literal_start < template.len() {
            tokens.push(Token::Literal(literal_start..template.len()));
        }

        let tokens = Arc::new(tokens);
        if self.cache.len() < self.limit {
            self.cache.insert(template.to_string(), tokens.clone());
        }
        tokens
    }

    /// Substitute placeholders using `lookup`
    ///
    /// `lookup` returns `None` to leave a placeholder unresolved.
    pub fn substitute<F>(&self, template: &str, mut lookup: F) -> Substitution
    where
        F: FnMut(&str) -> Option<String>,
    {
        let tokens = self.tokenize(template);
        let mut result = String::with_capacity(template.len());
        let mut complete = true;

        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&template[range.clone()]),
                Token::Placeholder { path, span } => match lookup(path) {
                    Some(text) => result.push_str(&text),
                    None => {
                        complete = false;
                        result.push_str(&template[span.clone()]);
                    }
                },
            }
        }

        if complete {
            Substitution::Complete(result)
        } else {
            Substitution::Partial(result)
        }
    }

    /// Number of cached templates
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Global template resolver instance
pub static TEMPLATE_RESOLVER: Lazy<TemplateResolver> = Lazy::new(TemplateResolver::new);

/// Convenience function for substituting with the global resolver
pub fn substitute<F>(template: &str, lookup: F) -> Substitution
where
    F: FnMut(&str) -> Option<String>,
{
    TEMPLATE_RESOLVER.substitute(template, lookup)
}

/// String form of a parameter inside a template
///
/// `None` is an undefined parameter and renders empty.
pub fn coerce(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenize_simple_literal() {
        let resolver = TemplateResolver::new();
        let tokens = resolver.tokenize("simple text");
        assert_eq!(*tokens, vec![Token::Literal(0..11)]);
    }

    #[test]
    fn test_tokenize_placeholders() {
        let resolver = TemplateResolver::new();
        let tokens = resolver.tokenize("${foo}/${bar.baz}!");
        assert_eq!(
            *tokens,
            vec![
                Token::Placeholder {
                    path: "foo".to_string(),
                    span: 0..6
                },
                Token::Literal(6..7),
                Token::Placeholder {
                    path: "bar.baz".to_string(),
                    span: 7..17
                },
                Token::Literal(17..18),
            ]
        );
    }

    #[test]
    fn test_empty_braces_are_literal() {
        let resolver = TemplateResolver::new();
        let tokens = resolver.tokenize("${}");
        assert_eq!(*tokens, vec![Token::Literal(0..3)]);
    }

    #[test]
    fn test_cache_reuse() {
        let resolver = TemplateResolver::new();
        let tokens1 = resolver.tokenize("${a}");
        let tokens2 = resolver.tokenize("${a}");
        assert!(Arc::ptr_eq(&tokens1, &tokens2));
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_cache_stops_growing_at_limit() {
        let resolver = TemplateResolver::with_limit(2);
        for i in 0..10 {
            resolver.tokenize(&format!("{}-${{host}}", i));
        }
        assert_eq!(resolver.cached(), 2);

        // Past the limit templates still tokenize, just without reuse
        let result = resolver.substitute("9-${host}", |_| Some("h".to_string()));
        assert_eq!(result, Substitution::Complete("9-h".to_string()));
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn test_complete_substitution() {
        let result = substitute("${foo}/${bar}", |path| Some(path.to_uppercase()));
        assert_eq!(result, Substitution::Complete("FOO/BAR".to_string()));
    }

    #[test]
    fn test_partial_substitution_keeps_placeholder() {
        let result = substitute("${foo}/${bar}", |path| (path == "foo").then(|| "1".to_string()));
        assert_eq!(result, Substitution::Partial("1/${bar}".to_string()));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce(Some(&json!("x"))), "x");
        assert_eq!(coerce(Some(&json!(1))), "1");
        assert_eq!(coerce(Some(&json!(1.5))), "1.5");
        assert_eq!(coerce(Some(&json!(true))), "true");
        assert_eq!(coerce(Some(&json!(null))), "null");
        assert_eq!(coerce(Some(&json!([1, null, "a"]))), "1,,a");
        assert_eq!(coerce(Some(&json!({"a": 1}))), r#"{"a":1}"#);
        assert_eq!(coerce(None), "");
    }
}
