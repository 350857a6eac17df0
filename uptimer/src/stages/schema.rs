//! JSON schema validation stage.
//!
//! Supports a practical subset of JSON Schema: `type`, `enum`, `required`,
//! `properties`, `items`, `minimum`, `maximum`, `minLength`, `maxLength` and
//! `pattern`. Unknown keywords are ignored.

use super::{missing_body, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::expr::display_value;
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};

/// Validates `data` against `schema`.
///
/// Returns one message per violation, each prefixed with the path of the
/// offending value (`$`, `$.items[2].name`, ...). An empty list means the
/// document is valid.
#[must_use]
pub fn validate_schema(schema: &Value, data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    validate_at(schema, data, "$", &mut errors);
    errors
}

fn validate_at(schema: &Value, data: &Value, path: &str, errors: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema.get("type") {
        let matches = match expected {
            Value::String(name) => matches_type(data, name),
            Value::Array(names) => names
                .iter()
                .filter_map(Value::as_str)
                .any(|name| matches_type(data, name)),
            _ => true,
        };
        if !matches {
            errors.push(format!(
                "{path}: expected type {}, got {}",
                display_value(expected),
                json_type(data)
            ));
        }
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(data) {
            errors.push(format!(
                "{path}: value {data} not in enum {}",
                Value::Array(allowed.clone())
            ));
        }
    }

    match data {
        Value::Object(object) => validate_object(schema, object, path, errors),
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_at(item_schema, item, &format!("{path}[{i}]"), errors);
                }
            }
        }
        Value::Number(n) => {
            let Some(value) = n.as_f64() else { return };
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
                if value < min {
                    errors.push(format!("{path}: {n} < minimum {}", schema["minimum"]));
                }
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
                if value > max {
                    errors.push(format!("{path}: {n} > maximum {}", schema["maximum"]));
                }
            }
        }
        Value::String(s) => validate_string(schema, s, path, errors),
        Value::Bool(_) | Value::Null => {}
    }
}

fn validate_object(
    schema: &Map<String, Value>,
    object: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<String>,
) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for prop in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(prop) {
                errors.push(format!("{path}: missing required property '{prop}'"));
            }
        }
    }

    if let Some(Value::Object(properties)) = schema.get("properties") {
        for (prop, prop_schema) in properties {
            if let Some(value) = object.get(prop) {
                validate_at(prop_schema, value, &format!("{path}.{prop}"), errors);
            }
        }
    }
}

fn validate_string(schema: &Map<String, Value>, s: &str, path: &str, errors: &mut Vec<String>) {
    let len = s.chars().count();
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if (len as u64) < min {
            errors.push(format!("{path}: length {len} < minLength {min}"));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        if (len as u64) > max {
            errors.push(format!("{path}: length {len} > maxLength {max}"));
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        match Regex::new(pattern) {
            // Anchored at the start only, like a prefix match.
            Ok(re) => {
                if !re.find(s).is_some_and(|m| m.start() == 0) {
                    errors.push(format!("{path}: does not match pattern {pattern}"));
                }
            }
            Err(_) => errors.push(format!("{path}: invalid pattern {pattern}")),
        }
    }
}

fn matches_type(data: &Value, name: &str) -> bool {
    match name {
        "string" => data.is_string(),
        "number" => data.is_number(),
        "integer" => data.is_i64() || data.is_u64(),
        "boolean" => data.is_boolean(),
        "array" => data.is_array(),
        "object" => data.is_object(),
        "null" => data.is_null(),
        _ => true,
    }
}

fn json_type(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validates the response body against a JSON schema.
#[derive(Debug, Clone)]
pub struct JsonSchemaStage {
    schema: Value,
}

impl JsonSchemaStage {
    /// Type identifier.
    pub const TYPE: &'static str = "json-schema";

    /// Creates the stage.
    #[must_use]
    pub fn new(schema: Value) -> Self {
        Self { schema }
    }

    /// Builds the stage from `schema`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self::new(config.schema.clone().unwrap_or(Value::Null)))
    }

    fn has_schema(&self) -> bool {
        match &self.schema {
            Value::Object(map) => !map.is_empty(),
            Value::Null => false,
            _ => true,
        }
    }
}

#[async_trait]
impl Stage for JsonSchemaStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    async fn check(&self, _target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(body) = ctx.body.as_deref() else {
            return missing_body("No response body to validate");
        };

        if !self.has_schema() {
            return Outcome::down("No schema specified").with_detail("error", "Schema is required");
        }

        let data: Value = match serde_json::from_str(body) {
            Ok(data) => data,
            Err(e) => {
                return Outcome::down("Invalid JSON response").with_detail("error", e.to_string())
            }
        };

        let errors = validate_schema(&self.schema, &data);
        if errors.is_empty() {
            return Outcome::up("Schema validation passed").with_detail("valid", true);
        }

        Outcome::down(format!("Schema validation failed: {} errors", errors.len()))
            .with_detail("error_count", errors.len())
            .with_detail("errors", errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name", "age"],
            "properties": {
                "name": {"type": "string", "minLength": 2},
                "age": {"type": "integer", "minimum": 0, "maximum": 150},
                "role": {"enum": ["admin", "user"]},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        })
    }

    #[test]
    fn test_valid_document() {
        let data = json!({"name": "Ada", "age": 36, "role": "admin", "tags": ["a"]});
        assert!(validate_schema(&user_schema(), &data).is_empty());
    }

    #[test]
    fn test_errors_are_path_tagged() {
        let data = json!({"name": "A", "age": 200, "role": "root", "tags": ["ok", 3]});
        let errors = validate_schema(&user_schema(), &data);
        assert_eq!(
            errors,
            vec![
                "$.name: length 1 < minLength 2".to_string(),
                "$.age: 200 > maximum 150".to_string(),
                "$.role: value \"root\" not in enum [\"admin\",\"user\"]".to_string(),
                "$.tags[1]: expected type string, got integer".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_required() {
        let errors = validate_schema(&user_schema(), &json!({"name": "Ada"}));
        assert_eq!(errors, vec!["$: missing required property 'age'".to_string()]);
    }

    #[test]
    fn test_type_lists_and_numbers() {
        let schema = json!({"type": ["string", "null"]});
        assert!(validate_schema(&schema, &json!(null)).is_empty());
        assert_eq!(validate_schema(&schema, &json!(1.5)).len(), 1);

        assert!(validate_schema(&json!({"type": "number"}), &json!(3)).is_empty());
        assert_eq!(validate_schema(&json!({"type": "integer"}), &json!(3.5)).len(), 1);
    }

    #[test]
    fn test_pattern_is_anchored_at_start() {
        let schema = json!({"type": "string", "pattern": "v\\d+"});
        assert!(validate_schema(&schema, &json!("v42-beta")).is_empty());
        assert_eq!(
            validate_schema(&schema, &json!("beta-v42")),
            vec!["$: does not match pattern v\\d+".to_string()]
        );
    }

    async fn run(schema: Value, body: Option<&str>) -> Outcome {
        let mut ctx = CheckContext::new("t");
        ctx.body = body.map(str::to_string);
        JsonSchemaStage::new(schema).check("t", &mut ctx).await
    }

    #[tokio::test]
    async fn test_stage_outcomes() {
        let outcome = run(user_schema(), Some(r#"{"name": "Ada", "age": 36}"#)).await;
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.message, "Schema validation passed");

        let outcome = run(user_schema(), Some(r#"{"age": -1}"#)).await;
        assert_eq!(outcome.severity, Severity::Down);
        assert_eq!(outcome.message, "Schema validation failed: 2 errors");
        assert_eq!(outcome.details.get("error_count"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_stage_preconditions() {
        assert_eq!(run(user_schema(), None).await.message, "No response body to validate");
        assert_eq!(run(json!({}), Some("{}")).await.message, "No schema specified");
        assert_eq!(run(user_schema(), Some("<html>")).await.message, "Invalid JSON response");
    }
}
