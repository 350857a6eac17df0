//! Response header extraction and assertion.

use super::Stage;
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use serde_json::Value;

/// Reads a response header, optionally asserting its value.
///
/// The header name comes from the `pattern` field and is matched without
/// regard to case.
#[derive(Debug, Clone)]
pub struct HeaderStage {
    name: String,
    store_as: Option<String>,
    expected: Option<String>,
}

impl HeaderStage {
    /// Type identifier.
    pub const TYPE: &'static str = "header";

    /// Creates the stage.
    #[must_use]
    pub fn new(name: impl Into<String>, store_as: Option<String>, expected: Option<String>) -> Self {
        Self {
            name: name.into(),
            store_as,
            expected,
        }
    }

    /// Builds the stage from `pattern`, `store_as` and `expected`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self::new(
            config.pattern.clone().unwrap_or_default(),
            config.store_as.clone(),
            config.expected.clone(),
        ))
    }
}

#[async_trait]
impl Stage for HeaderStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    async fn check(&self, _target: &str, ctx: &mut CheckContext) -> Outcome {
        if self.name.is_empty() {
            return Outcome::down("No header name specified")
                .with_detail("error", "Header name is required");
        }

        let Some(value) = ctx.headers.get(&self.name).map(str::to_string) else {
            return Outcome::down(format!("Header not found: {}", self.name))
                .with_detail("header", self.name.as_str())
                .with_detail("available_headers", ctx.headers.names());
        };

        if let Some(key) = &self.store_as {
            ctx.store(key.clone(), Value::String(value.clone()));
        }

        let outcome = match &self.expected {
            Some(expected) if *expected != value => {
                Outcome::down(format!("Expected {expected}, got {value}"))
            }
            _ => Outcome::up(format!("{}={value}", self.name)),
        };

        let outcome = outcome
            .with_detail("header", self.name.as_str())
            .with_detail("value", value);
        match &self.expected {
            Some(expected) => outcome.with_detail("expected", expected.as_str()),
            None => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResponseHeaders;
    use crate::core::Severity;
    use serde_json::json;

    fn ctx() -> CheckContext {
        let mut ctx = CheckContext::new("t");
        ctx.headers = [("Content-Type", "application/json"), ("X-Version", "2.40")]
            .into_iter()
            .collect::<ResponseHeaders>();
        ctx
    }

    #[tokio::test]
    async fn test_case_insensitive_lookup_and_store() {
        let stage = HeaderStage::new("content-type", Some("ct".into()), None);
        let mut ctx = ctx();
        let outcome = stage.check("t", &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.message, "content-type=application/json");
        assert_eq!(ctx.resolve("$ct"), Some(json!("application/json")));
    }

    #[tokio::test]
    async fn test_expected_value() {
        let mut ctx = ctx();
        let ok = HeaderStage::new("X-Version", None, Some("2.40".into()))
            .check("t", &mut ctx)
            .await;
        assert_eq!(ok.severity, Severity::Up);
        assert_eq!(ok.details.get("expected"), Some(&json!("2.40")));

        let bad = HeaderStage::new("X-Version", None, Some("2.41".into()))
            .check("t", &mut ctx)
            .await;
        assert_eq!(bad.severity, Severity::Down);
        assert_eq!(bad.message, "Expected 2.41, got 2.40");
    }

    #[tokio::test]
    async fn test_missing_header_lists_available() {
        let mut ctx = ctx();
        let outcome = HeaderStage::new("Server", None, None).check("t", &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Down);
        assert_eq!(outcome.message, "Header not found: Server");
        assert_eq!(
            outcome.details.get("available_headers"),
            Some(&json!(["Content-Type", "X-Version"]))
        );
    }

    #[tokio::test]
    async fn test_no_name() {
        let mut ctx = ctx();
        let outcome = HeaderStage::new("", None, None).check("t", &mut ctx).await;
        assert_eq!(outcome.message, "No header name specified");
    }
}
