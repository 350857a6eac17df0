//! Dotted-path mini-language in the style of jq.
//!
//! Supported syntax:
//!
//! - `.` for the whole document
//! - `.key` and chained `.a.b`
//! - `[n]` or `.[n]` for array positions (negative counts from the end)
//! - `["quoted key"]` for keys that are not plain words
//! - `| length`, `| keys`, `| type`, `| first`, `| last`
//!
//! Evaluation runs strictly left to right and stops with `None` as soon as
//! a step has nothing to work on.

use super::cursor::{resolve_index, Cursor, Subscript};
use super::{is_key_char, type_name, ExprError};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(i64),
}

/// Functions allowed on the right-hand side of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeFn {
    /// Characters, items or entries.
    Length,
    /// Object keys in document order.
    Keys,
    /// jq type name.
    Type,
    /// First array item.
    First,
    /// Last array item.
    Last,
}

impl FromStr for PipeFn {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "length" => Ok(Self::Length),
            "keys" => Ok(Self::Keys),
            "type" => Ok(Self::Type),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(ExprError::UnknownFunction {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PipeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => write!(f, "length"),
            Self::Keys => write!(f, "keys"),
            Self::Type => write!(f, "type"),
            Self::First => write!(f, "first"),
            Self::Last => write!(f, "last"),
        }
    }
}

impl PipeFn {
    fn apply(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::Length, Value::Null) => Some(Value::from(0)),
            (Self::Length, Value::String(s)) => Some(Value::from(s.chars().count())),
            (Self::Length, Value::Array(items)) => Some(Value::from(items.len())),
            (Self::Length, Value::Object(map)) => Some(Value::from(map.len())),
            (Self::Keys, Value::Object(map)) => {
                Some(Value::Array(map.keys().cloned().map(Value::String).collect()))
            }
            (Self::Keys, Value::Array(items)) => {
                Some(Value::Array((0..items.len()).map(Value::from).collect()))
            }
            (Self::Type, v) => Some(Value::from(type_name(v))),
            (Self::First, Value::Array(items)) => items.first().cloned(),
            (Self::Last, Value::Array(items)) => items.last().cloned(),
            _ => None,
        }
    }
}

/// A parsed jq-like expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JqExpr {
    source: String,
    steps: Vec<Step>,
    pipes: Vec<PipeFn>,
}

impl JqExpr {
    /// Parses an expression. An empty expression is the same as `.`.
    pub fn parse(expression: &str) -> Result<Self, ExprError> {
        let mut cur = Cursor::new(expression);
        cur.skip_whitespace();

        let mut steps = Vec::new();
        if !cur.is_at_end() && cur.peek() != Some('|') {
            if cur.peek() != Some('.') {
                return Err(ExprError::MissingRoot {
                    expected: '.',
                    expression: expression.to_string(),
                });
            }
            parse_path(&mut cur, &mut steps)?;
        }

        let mut pipes = Vec::new();
        loop {
            cur.skip_whitespace();
            let Some(c) = cur.peek() else { break };
            if c != '|' {
                return Err(ExprError::UnexpectedChar {
                    found: c,
                    offset: cur.pos(),
                });
            }
            cur.bump();
            cur.skip_whitespace();
            let name = cur.take_while(|c| c != '|' && !c.is_whitespace());
            pipes.push(name.parse()?);
        }

        Ok(Self {
            source: expression.trim().to_string(),
            steps,
            pipes,
        })
    }

    /// Returns the expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression against a document.
    #[must_use]
    pub fn evaluate(&self, doc: &Value) -> Option<Value> {
        let mut current = doc;
        for step in &self.steps {
            current = match (step, current) {
                (Step::Key(key), Value::Object(map)) => map.get(key)?,
                (Step::Index(index), Value::Array(items)) => {
                    items.get(resolve_index(*index, items.len())?)?
                }
                _ => return None,
            };
        }

        let mut value = current.clone();
        for pipe in &self.pipes {
            value = pipe.apply(&value)?;
        }
        Some(value)
    }
}

impl FromStr for JqExpr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JqExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_path(cur: &mut Cursor<'_>, steps: &mut Vec<Step>) -> Result<(), ExprError> {
    let mut first = true;
    loop {
        match cur.peek() {
            Some('.') => {
                let dot = cur.pos();
                cur.bump();
                match cur.peek() {
                    Some(c) if is_key_char(c) => {
                        steps.push(Step::Key(cur.take_while(is_key_char).to_string()));
                    }
                    Some('[') => steps.push(subscript_step(cur)?),
                    None | Some('|') if first => {}
                    Some(c) if first && c.is_whitespace() => {}
                    _ => {
                        return Err(ExprError::UnexpectedChar {
                            found: '.',
                            offset: dot,
                        })
                    }
                }
            }
            Some('[') if !first => steps.push(subscript_step(cur)?),
            None | Some('|') => return Ok(()),
            Some(c) if c.is_whitespace() => return Ok(()),
            Some(c) => {
                return Err(ExprError::UnexpectedChar {
                    found: c,
                    offset: cur.pos(),
                })
            }
        }
        first = false;
    }
}

fn subscript_step(cur: &mut Cursor<'_>) -> Result<Step, ExprError> {
    match cur.subscript()? {
        Subscript::Quoted(key) => Ok(Step::Key(key.to_string())),
        Subscript::Raw(raw) => raw
            .parse::<i64>()
            .map(Step::Index)
            .map_err(|_| ExprError::InvalidSubscript(raw.to_string())),
    }
}

/// Parses and evaluates `expression` against `doc` in one go.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use uptimer::expr::extract;
///
/// let doc = json!({"a": {"b": 5}});
/// assert_eq!(extract(&doc, ".a.b").unwrap(), Some(json!(5)));
/// assert_eq!(extract(&doc, ".missing").unwrap(), None);
/// ```
pub fn extract(doc: &Value, expression: &str) -> Result<Option<Value>, ExprError> {
    Ok(JqExpr::parse(expression)?.evaluate(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_nested_key() {
        assert_eq!(extract(&json!({"a": {"b": 5}}), ".a.b").unwrap(), Some(json!(5)));
    }

    #[test]
    fn test_root_returns_document() {
        let doc = json!({"x": [1, 2]});
        assert_eq!(extract(&doc, ".").unwrap(), Some(doc.clone()));
        assert_eq!(extract(&doc, "").unwrap(), Some(doc));
    }

    #[test]
    fn test_missing_key_is_absent() {
        assert_eq!(extract(&json!({}), ".missing").unwrap(), None);
        assert_eq!(extract(&json!({"a": 1}), ".a.b").unwrap(), None);
    }

    #[test]
    fn test_index_access() {
        let doc = json!({"items": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(extract(&doc, ".items[1].name").unwrap(), Some(json!("b")));
        assert_eq!(extract(&doc, ".items[-1].name").unwrap(), Some(json!("b")));
        assert_eq!(extract(&doc, ".items[5]").unwrap(), None);
        assert_eq!(extract(&json!([7, 8]), ".[0]").unwrap(), Some(json!(7)));
    }

    #[test]
    fn test_quoted_key() {
        let doc = json!({"a": {"b c": true}});
        assert_eq!(extract(&doc, ".a[\"b c\"]").unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_pipe_functions() {
        let doc = json!({"items": [1, 2, 3], "obj": {"z": 1, "a": 2}, "s": "héllo"});
        assert_eq!(extract(&doc, ".items | length").unwrap(), Some(json!(3)));
        assert_eq!(extract(&doc, ".s | length").unwrap(), Some(json!(5)));
        assert_eq!(extract(&doc, ".obj | keys").unwrap(), Some(json!(["z", "a"])));
        assert_eq!(extract(&doc, ".items | first").unwrap(), Some(json!(1)));
        assert_eq!(extract(&doc, ".items | last").unwrap(), Some(json!(3)));
        assert_eq!(extract(&doc, ".items | type").unwrap(), Some(json!("array")));
        assert_eq!(extract(&doc, ".obj | keys | length").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_pipe_on_incompatible_value_is_absent() {
        let doc = json!({"n": 5, "empty": []});
        assert_eq!(extract(&doc, ".n | first").unwrap(), None);
        assert_eq!(extract(&doc, ".empty | first").unwrap(), None);
        assert_eq!(extract(&doc, ".nothing | length").unwrap(), None);
        assert_eq!(extract(&json!({"x": null}), ".x | length").unwrap(), Some(json!(0)));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            JqExpr::parse("a.b"),
            Err(ExprError::MissingRoot { expected: '.', .. })
        ));
        assert!(matches!(
            JqExpr::parse(".a[0"),
            Err(ExprError::UnterminatedBracket { .. })
        ));
        assert!(matches!(
            JqExpr::parse(".a | reverse"),
            Err(ExprError::UnknownFunction { .. })
        ));
        assert!(matches!(
            JqExpr::parse(".a[x]"),
            Err(ExprError::InvalidSubscript(_))
        ));
        assert!(JqExpr::parse(".a..b").is_err());
    }

    #[test]
    fn test_display_round_trips_source() {
        let expr: JqExpr = " .items | length ".parse().unwrap();
        assert_eq!(expr.to_string(), ".items | length");
        assert_eq!(expr.as_str(), ".items | length");
    }
}
