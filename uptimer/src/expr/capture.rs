//! Regex capture extraction.

use super::ExprError;
use regex::Regex;
use serde_json::{Map, Value};

/// The groups captured by a single regex search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    /// Text of the whole match.
    pub matched: String,
    /// Character offset of the match within the subject.
    pub position: usize,
    /// Every capture group in pattern order, named ones included.
    pub groups: Vec<Option<String>>,
    /// Named groups in pattern order.
    pub named: Vec<(String, Option<String>)>,
}

impl Captures {
    /// Runs one leftmost search of `re` over `subject`.
    #[must_use]
    pub fn search(re: &Regex, subject: &str) -> Option<Self> {
        let caps = re.captures(subject)?;
        let whole = caps.get(0)?;

        let groups = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = re
            .capture_names()
            .flatten()
            .map(|name| {
                (
                    name.to_string(),
                    caps.name(name).map(|m| m.as_str().to_string()),
                )
            })
            .collect();

        Some(Self {
            matched: whole.as_str().to_string(),
            position: subject[..whole.start()].chars().count(),
            groups,
            named,
        })
    }

    /// The value an extraction stores: the first group, else the first
    /// named group, else nothing.
    #[must_use]
    pub fn primary(&self) -> Option<Option<&str>> {
        if let Some(first) = self.groups.first() {
            return Some(first.as_deref());
        }
        self.named.first().map(|(_, v)| v.as_deref())
    }

    /// Groups as a JSON array, unmatched groups as null.
    #[must_use]
    pub fn groups_json(&self) -> Value {
        Value::Array(
            self.groups
                .iter()
                .map(|g| g.clone().map_or(Value::Null, Value::String))
                .collect(),
        )
    }

    /// Named groups as a JSON object.
    #[must_use]
    pub fn named_json(&self) -> Value {
        let map: Map<String, Value> = self
            .named
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().map_or(Value::Null, Value::String)))
            .collect();
        Value::Object(map)
    }
}

/// Compiles `pattern` and searches `subject` once.
///
/// # Examples
///
/// ```
/// use uptimer::expr::capture;
///
/// let caps = capture(r"version: (\d+\.\d+\.\d+)", "version: 3.2.1").unwrap().unwrap();
/// assert_eq!(caps.groups[0].as_deref(), Some("3.2.1"));
/// assert!(capture("(", "x").is_err());
/// ```
pub fn capture(pattern: &str, subject: &str) -> Result<Option<Captures>, ExprError> {
    let re = Regex::new(pattern)?;
    Ok(Captures::search(&re, subject))
}
