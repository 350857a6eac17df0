//! JSONPath subset.
//!
//! Supported syntax: `$`, `.key`, `["key"]`, `..key` (recursive descent),
//! `[*]` and `.*`, `[start:end]` and `[n]`. Negative positions count from
//! the end of the array.
//!
//! Recursive descent walks the document depth-first in pre-order: a node's
//! own match comes before any match found inside it, and children are
//! visited in document order.

use super::cursor::{resolve_index, Cursor, Subscript};
use super::{is_key_char, ExprError};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Child(String),
    Descendant(String),
    Wildcard,
    Index(i64),
    Slice(Option<i64>, Option<i64>),
}

/// A parsed JSONPath expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parses an expression, which must start with `$`.
    pub fn parse(expression: &str) -> Result<Self, ExprError> {
        let trimmed = expression.trim();
        let mut cur = Cursor::new(trimmed);
        if !cur.eat('$') {
            return Err(ExprError::MissingRoot {
                expected: '$',
                expression: expression.to_string(),
            });
        }

        let mut segments = Vec::new();
        while let Some(c) = cur.peek() {
            let offset = cur.pos();
            match c {
                '.' => {
                    cur.bump();
                    if cur.eat('.') {
                        let key = cur.take_while(is_key_char);
                        if key.is_empty() {
                            return Err(unexpected(&cur, offset));
                        }
                        segments.push(Segment::Descendant(key.to_string()));
                    } else if cur.eat('*') {
                        segments.push(Segment::Wildcard);
                    } else {
                        let key = cur.take_while(is_key_char);
                        if key.is_empty() {
                            return Err(unexpected(&cur, offset));
                        }
                        segments.push(Segment::Child(key.to_string()));
                    }
                }
                '[' => segments.push(parse_subscript(cur.subscript()?)?),
                other => {
                    return Err(ExprError::UnexpectedChar {
                        found: other,
                        offset,
                    })
                }
            }
        }

        Ok(Self {
            source: trimmed.to_string(),
            segments,
        })
    }

    /// Returns the expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns every match, in traversal order.
    #[must_use]
    pub fn select(&self, doc: &Value) -> Vec<Value> {
        let mut nodes = vec![doc];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in nodes {
                apply(segment, node, &mut next);
            }
            if next.is_empty() {
                return Vec::new();
            }
            nodes = next;
        }
        nodes.into_iter().cloned().collect()
    }
}

impl FromStr for JsonPath {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn unexpected(cur: &Cursor<'_>, offset: usize) -> ExprError {
    ExprError::UnexpectedChar {
        found: cur.peek().unwrap_or('.'),
        offset,
    }
}

fn parse_subscript(subscript: Subscript<'_>) -> Result<Segment, ExprError> {
    let raw = match subscript {
        Subscript::Quoted(key) => return Ok(Segment::Child(key.to_string())),
        Subscript::Raw(raw) => raw,
    };
    let invalid = || ExprError::InvalidSubscript(raw.to_string());

    if raw == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some((start, end)) = raw.split_once(':') {
        let bound = |s: &str| -> Result<Option<i64>, ExprError> {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(|_| invalid())
            }
        };
        return Ok(Segment::Slice(bound(start)?, bound(end)?));
    }
    raw.parse().map(Segment::Index).map_err(|_| invalid())
}

fn apply<'v>(segment: &Segment, node: &'v Value, out: &mut Vec<&'v Value>) {
    match (segment, node) {
        (Segment::Child(key), Value::Object(map)) => out.extend(map.get(key)),
        (Segment::Descendant(key), _) => descend(key, node, out),
        (Segment::Wildcard, Value::Array(items)) => out.extend(items.iter()),
        (Segment::Wildcard, Value::Object(map)) => out.extend(map.values()),
        (Segment::Index(index), Value::Array(items)) => {
            out.extend(resolve_index(*index, items.len()).and_then(|i| items.get(i)));
        }
        (Segment::Slice(start, end), Value::Array(items)) => {
            let len = items.len();
            let lo = start.map_or(0, |s| clamp(s, len));
            let hi = end.map_or(len, |e| clamp(e, len));
            if lo < hi {
                out.extend(items[lo..hi].iter());
            }
        }
        _ => {}
    }
}

fn descend<'v>(key: &str, node: &'v Value, out: &mut Vec<&'v Value>) {
    match node {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                out.push(found);
            }
            for child in map.values() {
                descend(key, child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                descend(key, child, out);
            }
        }
        _ => {}
    }
}

/// Clamps a slice bound the way Python slicing does.
fn clamp(bound: i64, len: usize) -> usize {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if bound < 0 { len_i + bound } else { bound };
    usize::try_from(resolved.clamp(0, len_i)).unwrap_or(0)
}

/// Parses `expression` and returns every match in `doc`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use uptimer::expr::select;
///
/// let doc = json!({"items": [10, 20, 30]});
/// assert_eq!(select(&doc, "$.items[1:]").unwrap(), vec![json!(20), json!(30)]);
/// ```
pub fn select(doc: &Value, expression: &str) -> Result<Vec<Value>, ExprError> {
    Ok(JsonPath::parse(expression)?.select(doc))
}
