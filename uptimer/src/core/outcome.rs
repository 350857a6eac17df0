//! Per-stage outcome with factory methods.

use super::Severity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The result of one stage checking one target.
///
/// Built through the `up` / `degraded` / `down` factories and the `with_*`
/// builders; never changed after the stage returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Verdict of the stage.
    pub severity: Severity,

    /// Human-readable summary.
    pub message: String,

    /// Time spent by the stage in milliseconds. Zero for pure stages.
    #[serde(default)]
    pub elapsed_ms: f64,

    /// Stage-specific details.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl Outcome {
    /// Creates an outcome with the given severity.
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            elapsed_ms: 0.0,
            details: Map::new(),
        }
    }

    /// Creates an `Up` outcome.
    #[must_use]
    pub fn up(message: impl Into<String>) -> Self {
        Self::new(Severity::Up, message)
    }

    /// Creates a `Degraded` outcome.
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(Severity::Degraded, message)
    }

    /// Creates a `Down` outcome.
    #[must_use]
    pub fn down(message: impl Into<String>) -> Self {
        Self::new(Severity::Down, message)
    }

    /// Sets the elapsed time.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed_ms: f64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Adds a single detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Replaces the details map.
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Returns true if the stage reported `Up`.
    #[must_use]
    pub const fn is_up(&self) -> bool {
        self.severity.is_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_factories() {
        assert_eq!(Outcome::up("ok").severity, Severity::Up);
        assert_eq!(Outcome::degraded("meh").severity, Severity::Degraded);
        let down = Outcome::down("gone");
        assert_eq!(down.severity, Severity::Down);
        assert_eq!(down.message, "gone");
        assert!((down.elapsed_ms - 0.0).abs() < f64::EPSILON);
        assert!(down.details.is_empty());
    }

    #[test]
    fn test_builders() {
        let outcome = Outcome::up("200")
            .with_elapsed(12.5)
            .with_detail("status_code", 200)
            .with_detail("server", "nginx");
        assert!((outcome.elapsed_ms - 12.5).abs() < f64::EPSILON);
        assert_eq!(outcome.details.get("status_code"), Some(&json!(200)));
        assert_eq!(outcome.details.get("server"), Some(&json!("nginx")));
    }

    #[test]
    fn test_serialization_skips_empty_details() {
        let json = serde_json::to_value(Outcome::up("fine")).unwrap();
        assert_eq!(json, json!({"severity": "up", "message": "fine", "elapsed_ms": 0.0}));
    }
}
