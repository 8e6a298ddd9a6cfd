//! Recursive input sanitization.
//!
//! Two passes over a decoded input tree, always in this order:
//!
//! 1. [`Sanitizer::prevent_nosql_injection`] drops mapping entries whose key
//!    is a document-store query operator, together with their whole subtree.
//! 2. [`Sanitizer::sanitize_value`] strips markup from every string and
//!    escapes the HTML special characters, except under credential keys.
//!
//! The operator pass inspects raw keys, so it must see them before anything
//! is escaped. Escaping is single-pass: running it twice escapes `&` again.

use std::collections::HashSet;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::SanitizerConfig;

/// Query operators of the document store behind the controllers.
///
/// This list is specific to that store's query syntax; swap it through
/// `sanitizer.operator_denylist` when the controllers run on another engine.
pub const DOCUMENT_STORE_OPERATORS: &[&str] = &[
    "$where",
    "$ne",
    "$gt",
    "$gte",
    "$lt",
    "$lte",
    "$in",
    "$nin",
    "$regex",
    "$exists",
    "$elemMatch",
    "$size",
    "$type",
    "$mod",
    "$text",
    "$geoWithin",
    "$geoIntersects",
    "$near",
    "$nearSphere",
];

/// Keys whose values are hashed downstream and must reach the controllers verbatim.
pub const CREDENTIAL_KEYS: &[&str] = &["password", "adminPassword"];

/// Errors raised while walking an input tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("input nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Configured sanitizer shared by every request.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    operator_prefix: String,
    denylist: HashSet<String>,
    preserved_keys: HashSet<String>,
    max_depth: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(&SanitizerConfig::default())
    }
}

impl Sanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            operator_prefix: config.operator_prefix.clone(),
            denylist: config.operator_denylist.iter().cloned().collect(),
            preserved_keys: config.preserved_keys.iter().cloned().collect(),
            max_depth: config.max_depth,
        }
    }

    /// Run both passes, operators first.
    pub fn clean(&self, value: Value) -> Result<Value, SanitizeError> {
        let value = self.prevent_nosql_injection(value)?;
        self.sanitize_value(value)
    }

    /// Whether a mapping key would be read as a query operator.
    pub fn is_operator_key(&self, key: &str) -> bool {
        (!self.operator_prefix.is_empty() && key.starts_with(&self.operator_prefix))
            || self.denylist.contains(key)
    }

    /// Remove operator keys at every depth.
    pub fn prevent_nosql_injection(&self, value: Value) -> Result<Value, SanitizeError> {
        self.strip_operators(value, 0)
    }

    /// Strip markup and escape strings at every depth.
    pub fn sanitize_value(&self, value: Value) -> Result<Value, SanitizeError> {
        self.escape_markup(value, 0)
    }

    fn check_depth(&self, depth: usize) -> Result<(), SanitizeError> {
        if depth > self.max_depth {
            return Err(SanitizeError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn strip_operators(&self, value: Value, depth: usize) -> Result<Value, SanitizeError> {
        self.check_depth(depth)?;
        match value {
            Value::Object(map) => {
                let mut cleaned = Map::with_capacity(map.len());
                for (key, child) in map {
                    if self.is_operator_key(&key) {
                        tracing::debug!(key = %key, "Dropped query operator from input");
                        continue;
                    }
                    cleaned.insert(key, self.strip_operators(child, depth + 1)?);
                }
                Ok(Value::Object(cleaned))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.strip_operators(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            scalar => Ok(scalar),
        }
    }

    fn escape_markup(&self, value: Value, depth: usize) -> Result<Value, SanitizeError> {
        self.check_depth(depth)?;
        match value {
            Value::String(s) => Ok(Value::String(sanitize_string(&s))),
            Value::Object(map) => {
                let mut cleaned = Map::with_capacity(map.len());
                for (key, child) in map {
                    let child = if self.preserved_keys.contains(&key) {
                        child
                    } else {
                        self.escape_markup(child, depth + 1)?
                    };
                    cleaned.insert(key, child);
                }
                Ok(Value::Object(cleaned))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.escape_markup(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            scalar => Ok(scalar),
        }
    }
}

/// Strip tags, escape, then trim a single string.
pub fn sanitize_string(input: &str) -> String {
    escape_html(&strip_tags(input)).trim().to_string()
}

/// Remove every `<...>` run. A `<` with no closing `>` after it is kept.
pub fn strip_tags(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        output.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }

    output.push_str(rest);
    output
}

/// Escape `& < > " ' /` as HTML entities.
pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            '/' => output.push_str("&#x2F;"),
            _ => output.push(c),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sanitizer() -> Sanitizer {
        Sanitizer::default()
    }

    fn contains_key(value: &Value, needle: &str) -> bool {
        match value {
            Value::Object(map) => map
                .iter()
                .any(|(k, v)| k == needle || contains_key(v, needle)),
            Value::Array(items) => items.iter().any(|v| contains_key(v, needle)),
            _ => false,
        }
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>World</b></p>"), "Hello World");
        assert_eq!(strip_tags("a < b"), "a < b");
        assert_eq!(strip_tags("a > b"), "a > b");
        assert_eq!(strip_tags("<a<b>c"), "c");
        assert_eq!(strip_tags("x <unclosed"), "x <unclosed");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"& < > " ' /"#),
            "&amp; &lt; &gt; &quot; &#x27; &#x2F;"
        );
    }

    #[test]
    fn test_sanitize_string_order() {
        assert_eq!(sanitize_string("  <b>hi</b>  "), "hi");
        assert_eq!(sanitize_string("<script>alert('x')</script>"), "alert(&#x27;x&#x27;)");
        assert_eq!(sanitize_string("x < y"), "x &lt; y");
        assert_eq!(sanitize_string("https://shop.test"), "https:&#x2F;&#x2F;shop.test");
    }

    #[test]
    fn test_escaping_is_single_pass() {
        let once = sanitize_string("fish & chips");
        assert_eq!(once, "fish &amp; chips");
        assert_eq!(sanitize_string(&once), "fish &amp;amp; chips");
    }

    #[test]
    fn test_operator_keys_dropped_with_subtree() {
        let input = json!({
            "email": "a@b.c",
            "$where": "this.password.length > 0",
            "filter": { "price": { "$gt": 0, "currency": "EUR" } },
            "$or": [{ "secret": "leak" }],
        });

        let cleaned = sanitizer().prevent_nosql_injection(input).unwrap();

        assert_eq!(
            cleaned,
            json!({ "email": "a@b.c", "filter": { "price": { "currency": "EUR" } } })
        );
        assert!(!contains_key(&cleaned, "secret"));
    }

    #[test]
    fn test_every_denylisted_operator_is_dropped() {
        let s = sanitizer();
        let mut map = Map::new();
        for op in DOCUMENT_STORE_OPERATORS {
            map.insert(op.to_string(), json!("x"));
        }
        map.insert("keep".into(), json!("y"));

        let cleaned = s.prevent_nosql_injection(Value::Object(map)).unwrap();
        assert_eq!(cleaned, json!({ "keep": "y" }));
    }

    #[test]
    fn test_custom_denylist_without_prefix() {
        let config = SanitizerConfig {
            operator_prefix: String::new(),
            operator_denylist: vec!["__proto__".into()],
            ..SanitizerConfig::default()
        };
        let s = Sanitizer::new(&config);

        let cleaned = s
            .prevent_nosql_injection(json!({ "__proto__": {}, "$ne": 1 }))
            .unwrap();
        assert_eq!(cleaned, json!({ "$ne": 1 }));
    }

    #[test]
    fn test_credentials_preserved() {
        let cleaned = sanitizer()
            .clean(json!({
                "password": "<b>hi</b>",
                "adminPassword": " p&ss ",
                "bio": "<b>hi</b>",
            }))
            .unwrap();

        assert_eq!(cleaned["password"], "<b>hi</b>");
        assert_eq!(cleaned["adminPassword"], " p&ss ");
        assert_eq!(cleaned["bio"], "hi");
    }

    #[test]
    fn test_credential_keys_still_lose_operators() {
        let cleaned = sanitizer()
            .clean(json!({ "password": { "$ne": null } }))
            .unwrap();
        assert_eq!(cleaned, json!({ "password": {} }));
    }

    #[test]
    fn test_arrays_keep_order_and_length() {
        let cleaned = sanitizer()
            .clean(json!([
                { "name": "<i>a</i>", "$gt": 1 },
                "b & c",
                3,
                null,
                [],
                {}
            ]))
            .unwrap();

        assert_eq!(
            cleaned,
            json!([{ "name": "a" }, "b &amp; c", 3, null, [], {}])
        );
    }

    #[test]
    fn test_non_string_scalars_untouched() {
        let cleaned = sanitizer()
            .clean(json!({ "price": 9.5, "active": true, "stock": null }))
            .unwrap();
        assert_eq!(cleaned, json!({ "price": 9.5, "active": true, "stock": null }));
    }

    #[test]
    fn test_key_order_preserved() {
        let cleaned = sanitizer()
            .clean(json!({ "z": "1", "a": "2", "m": "3" }))
            .unwrap();
        let keys: Vec<_> = cleaned.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_depth_limit() {
        let config = SanitizerConfig {
            max_depth: 3,
            ..SanitizerConfig::default()
        };
        let s = Sanitizer::new(&config);

        assert!(s.clean(json!({ "a": { "b": { "c": "ok" } } })).is_ok());
        assert_eq!(
            s.clean(json!({ "a": { "b": { "c": { "d": "deep" } } } })),
            Err(SanitizeError::TooDeep { limit: 3 })
        );
    }

    #[test]
    fn test_no_tag_survives() {
        let inputs = ["<img src=x onerror=alert(1)>", "a<br/>b", "<<b>>", "</div>text"];
        for input in inputs {
            let out = sanitize_string(input);
            assert!(!out.contains('<') && !out.contains('>'), "{input} -> {out}");
        }
    }
}
