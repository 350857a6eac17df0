//! Declarative stage configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Configuration for one stage of a pipeline.
///
/// A flat record: `type` selects the stage and every other field is
/// optional. Each stage reads only the fields it understands, so a config
/// may carry fields that are irrelevant to its type. Unknown JSON fields are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage type identifier, resolved through the registry.
    #[serde(rename = "type")]
    pub stage_type: String,

    /// Username for authenticated stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for authenticated stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Extraction expression (jq or JSONPath).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,

    /// Key under which extracted values are stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,

    /// Lower bound for threshold checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Upper bound for threshold checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Value reference such as `$elapsed_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Regex pattern, or header name for the header stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Inverts the containment check.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,

    /// Maximum age in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,

    /// Days before certificate expiry that count as degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_days: Option<i64>,

    /// Port for socket stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Address the DNS stage must resolve to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_ip: Option<String>,

    /// JSON schema document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Extra request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    /// Expected header value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Minimum platform version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    /// Platform job type filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,

    /// Per-stage timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl StageConfig {
    /// Creates a config with only a type.
    #[must_use]
    pub fn new(stage_type: impl Into<String>) -> Self {
        Self {
            stage_type: stage_type.into(),
            ..Self::default()
        }
    }

    /// Sets the expression.
    #[must_use]
    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    /// Sets the store key.
    #[must_use]
    pub fn with_store_as(mut self, key: impl Into<String>) -> Self {
        self.store_as = Some(key.into());
        self
    }

    /// Sets the value reference.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the bounds.
    #[must_use]
    pub const fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Sets the pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Sets the negate flag.
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Sets the maximum age in seconds.
    #[must_use]
    pub const fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the schema document.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the expected value.
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal() {
        let config: StageConfig = serde_json::from_value(json!({"type": "http"})).unwrap();
        assert_eq!(config, StageConfig::new("http"));
        assert!(!config.negate);
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let config: StageConfig = serde_json::from_value(json!({
            "type": "threshold",
            "value": "$elapsed_ms",
            "max": 5000,
            "colour": "blue"
        }))
        .unwrap();
        assert_eq!(config.value.as_deref(), Some("$elapsed_ms"));
        assert_eq!(config.max, Some(5000.0));
    }

    #[test]
    fn test_deserialize_requires_type() {
        assert!(serde_json::from_value::<StageConfig>(json!({"expr": "."})).is_err());
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let config = StageConfig::new("jq").with_expr(".a").with_store_as("a");
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({"type": "jq", "expr": ".a", "store_as": "a"})
        );
    }
}
