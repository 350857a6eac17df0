//! Expression evaluators used by the extraction stages.
//!
//! Three small languages are supported:
//!
//! - [`jq`]: a dotted-path mini-language with a fixed set of pipe functions
//! - [`jsonpath`]: a JSONPath subset returning every match
//! - [`capture`]: a single regex search returning capture groups
//!
//! All evaluators are pure. Malformed syntax is an [`ExprError`]; a value
//! that simply is not there is reported as `None` or an empty match list.

pub mod capture;
mod cursor;
pub mod jq;
pub mod jsonpath;

pub use capture::{capture, Captures};
pub use jq::{extract, JqExpr};
pub use jsonpath::{select, JsonPath};

use thiserror::Error;

/// Syntax errors raised while parsing an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// The expression does not start with the required root token.
    #[error("expression must start with '{expected}': {expression}")]
    MissingRoot {
        /// Required root character.
        expected: char,
        /// The offending expression.
        expression: String,
    },

    /// A `[` without a matching `]`, or an unterminated quoted key.
    #[error("unterminated bracket at offset {offset}")]
    UnterminatedBracket {
        /// Byte offset of the opening bracket.
        offset: usize,
    },

    /// A character that cannot start a path step.
    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedChar {
        /// The character found.
        found: char,
        /// Byte offset of the character.
        offset: usize,
    },

    /// A bracket body that is not a valid index, slice or key.
    #[error("invalid subscript '[{0}]'")]
    InvalidSubscript(String),

    /// A pipe function outside the supported set.
    #[error("unknown function '{name}' (expected one of length, keys, type, first, last)")]
    UnknownFunction {
        /// The function name as written.
        name: String,
    },

    /// A regex that failed to compile.
    #[error("invalid regex: {0}")]
    Regex(String),
}

impl From<regex::Error> for ExprError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

/// Returns true for characters allowed in a bare key (`\w` in regex terms).
pub(crate) fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Renders a JSON value the way it appears in stage messages.
///
/// Strings are printed without quotes; everything else uses compact JSON.
#[must_use]
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns the jq type name of a JSON value.
#[must_use]
pub const fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("abc")), "abc");
        assert_eq!(display_value(&json!(5)), "5");
        assert_eq!(display_value(&json!([1, "a"])), "[1,\"a\"]");
        assert_eq!(display_value(&json!(null)), "null");
    }

    #[test]
    fn test_type_name() {
        assert_eq!(type_name(&json!({})), "object");
        assert_eq!(type_name(&json!(1.5)), "number");
        assert_eq!(type_name(&json!(true)), "boolean");
    }

    #[test]
    fn test_regex_error_conversion() {
        let err: ExprError = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, ExprError::Regex(_)));
    }
}
