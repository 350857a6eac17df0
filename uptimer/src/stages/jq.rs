//! jq-style extraction stage.

use super::{missing_body, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::expr::{display_value, type_name, JqExpr};
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use serde_json::Value;

/// Extracts a value from the JSON body with a jq-like expression.
#[derive(Debug, Clone)]
pub struct JqStage {
    expr: JqExpr,
    store_as: Option<String>,
}

impl JqStage {
    /// Type identifier.
    pub const TYPE: &'static str = "jq";

    /// Creates a stage from an already parsed expression.
    #[must_use]
    pub const fn new(expr: JqExpr, store_as: Option<String>) -> Self {
        Self { expr, store_as }
    }

    /// Builds the stage from `expr` (default `.`) and `store_as`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        let raw = config.expr.as_deref().unwrap_or(".");
        let expr = JqExpr::parse(raw)
            .map_err(|e| MonitorError::invalid_expression(Self::TYPE, raw, e))?;
        Ok(Self::new(expr, config.store_as.clone()))
    }
}

#[async_trait]
impl Stage for JqStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    async fn check(&self, _target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(body) = ctx.body.as_deref() else {
            return missing_body("No response body to extract from");
        };

        let doc: Value = match serde_json::from_str(body) {
            Ok(doc) => doc,
            Err(e) => {
                return Outcome::down("Invalid JSON response").with_detail("error", e.to_string())
            }
        };

        let value = self.expr.evaluate(&doc).unwrap_or(Value::Null);
        if let Some(key) = &self.store_as {
            ctx.store(key.clone(), value.clone());
        }

        Outcome::up(format!("extracted: {}", display_value(&value)))
            .with_detail("expression", self.expr.as_str())
            .with_detail("type", type_name(&value))
            .with_detail("value", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use serde_json::json;

    fn stage(expr: &str, store_as: Option<&str>) -> JqStage {
        let mut config = StageConfig::new("jq").with_expr(expr);
        config.store_as = store_as.map(String::from);
        JqStage::from_config(&config, &ProbeSettings::default()).unwrap()
    }

    fn ctx_with_body(body: &str) -> CheckContext {
        let mut ctx = CheckContext::new("example.org");
        ctx.body = Some(body.to_string());
        ctx
    }

    #[tokio::test]
    async fn test_extracts_and_stores() {
        let mut ctx = ctx_with_body(r#"{"data": {"count": 42}}"#);
        let outcome = stage(".data.count", Some("count")).check("t", &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.message, "extracted: 42");
        assert_eq!(outcome.details.get("type"), Some(&json!("number")));
        assert_eq!(ctx.resolve("$count"), Some(json!(42)));
    }

    #[tokio::test]
    async fn test_absent_value_stores_null() {
        let mut ctx = ctx_with_body(r#"{"a": 1}"#);
        let outcome = stage(".missing", Some("m")).check("t", &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.message, "extracted: null");
        assert_eq!(ctx.value("m"), Some(&json!(null)));
    }

    #[tokio::test]
    async fn test_missing_body_is_down() {
        let mut ctx = CheckContext::new("t");
        let outcome = stage(".", None).check("t", &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Down);
        assert_eq!(outcome.message, "No response body to extract from");
    }

    #[tokio::test]
    async fn test_invalid_json_is_down() {
        let mut ctx = ctx_with_body("<html>");
        let outcome = stage(".", None).check("t", &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Down);
        assert_eq!(outcome.message, "Invalid JSON response");
    }

    #[test]
    fn test_bad_expression_is_config_error() {
        let config = StageConfig::new("jq").with_expr(".a | explode");
        let err = JqStage::from_config(&config, &ProbeSettings::default()).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidExpression { .. }));
    }
}
