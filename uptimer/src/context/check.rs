//! Run-scoped mutable state threaded through the stages of one pipeline run.

use super::ResponseHeaders;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Built-in value reference for the elapsed time of the last network stage.
pub const ELAPSED_MS_REF: &str = "$elapsed_ms";

/// The state shared by the stages of a single run.
///
/// Network stages record what they received; extraction stages read the body
/// and store named values that later assertion stages resolve with `$name`.
/// A new context is created for every run and dropped when the run ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckContext {
    target: String,
    /// Body of the last response.
    pub body: Option<String>,
    /// Headers of the last response.
    pub headers: ResponseHeaders,
    /// Status code of the last response.
    pub status_code: Option<u16>,
    /// Elapsed time of the last network stage in milliseconds.
    pub elapsed_ms: f64,
    /// Named values stored by extraction stages.
    pub values: Map<String, Value>,
}

impl CheckContext {
    /// Creates an empty context for `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// The target of this run.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Records a response in one step.
    pub fn record_response(
        &mut self,
        status_code: u16,
        headers: ResponseHeaders,
        body: String,
        elapsed_ms: f64,
    ) {
        self.status_code = Some(status_code);
        self.headers = headers;
        self.body = Some(body);
        self.elapsed_ms = elapsed_ms;
    }

    /// Stores a named value, replacing any previous one.
    pub fn store(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Looks up a stored value.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Resolves a value reference.
    ///
    /// `$elapsed_ms`, `$status_code` and `$response_length` are built in;
    /// any other `$name` is looked up among the stored values. A reference
    /// without `$` is a literal: a number when it parses as one, otherwise
    /// the string itself. `None` means nothing is there, including a stored
    /// `null`.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<Value> {
        let Some(key) = reference.strip_prefix('$') else {
            return Some(literal(reference));
        };

        match key {
            "elapsed_ms" => Some(Value::from(self.elapsed_ms)),
            "status_code" => self.status_code.map(Value::from),
            "response_length" => Some(Value::from(
                self.body.as_deref().map_or(0, |b| b.chars().count()),
            )),
            _ => self.values.get(key).filter(|v| !v.is_null()).cloned(),
        }
    }
}

fn literal(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(raw.to_string()),
    }
}
