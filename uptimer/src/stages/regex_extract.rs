//! Regex extraction stage.

use super::{missing_body, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::expr::{Captures, ExprError};
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

/// Extracts capture groups from the body with a regex.
///
/// The first positional group, or failing that the first named group, is
/// stored under `store_as`. A pattern that does not compile is reported as
/// a `Down` outcome each time the stage runs.
#[derive(Debug, Clone)]
pub struct RegexStage {
    pattern: String,
    compiled: Result<Regex, ExprError>,
    store_as: Option<String>,
}

impl RegexStage {
    /// Type identifier.
    pub const TYPE: &'static str = "regex";

    /// Creates the stage.
    #[must_use]
    pub fn new(pattern: impl Into<String>, store_as: Option<String>) -> Self {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern).map_err(ExprError::from);
        Self {
            pattern,
            compiled,
            store_as,
        }
    }

    /// Builds the stage from `pattern` and `store_as`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self::new(
            config.pattern.clone().unwrap_or_default(),
            config.store_as.clone(),
        ))
    }
}

#[async_trait]
impl Stage for RegexStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    async fn check(&self, _target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(body) = ctx.body.as_deref() else {
            return missing_body("No response body to extract from");
        };

        if self.pattern.is_empty() {
            return Outcome::down("No pattern specified").with_detail("error", "Pattern is required");
        }

        let re = match &self.compiled {
            Ok(re) => re,
            Err(e) => {
                let reason = match e {
                    ExprError::Regex(msg) => msg.clone(),
                    other => other.to_string(),
                };
                return Outcome::down(format!("Invalid regex: {reason}"))
                    .with_detail("pattern", self.pattern.as_str())
                    .with_detail("error", reason);
            }
        };

        let Some(caps) = Captures::search(re, body) else {
            return Outcome::down("Pattern not matched").with_detail("pattern", self.pattern.as_str());
        };

        let primary = caps.primary();
        if let (Some(key), Some(value)) = (&self.store_as, primary) {
            let value = value.map_or(Value::Null, |v| Value::String(v.to_string()));
            ctx.store(key.clone(), value);
        }

        let shown = match caps.groups.first() {
            Some(first) => first.clone().unwrap_or_else(|| "null".to_string()),
            None => caps.matched.clone(),
        };

        Outcome::up(format!("extracted: {shown}"))
            .with_detail("pattern", self.pattern.as_str())
            .with_detail("match", caps.matched.as_str())
            .with_detail("groups", caps.groups_json())
            .with_detail("named_groups", caps.named_json())
    }
}
