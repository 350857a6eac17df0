//! JSONPath extraction stage.

use super::{missing_body, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::expr::{display_value, JsonPath};
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use serde_json::Value;

/// Matches reported in the outcome details.
const MAX_REPORTED_MATCHES: usize = 10;

/// Extracts values from the JSON body with a JSONPath expression.
///
/// A single match is stored as a scalar, several as a list.
#[derive(Debug, Clone)]
pub struct JsonPathStage {
    path: JsonPath,
    store_as: Option<String>,
}

impl JsonPathStage {
    /// Type identifier.
    pub const TYPE: &'static str = "jsonpath";

    /// Creates a stage from an already parsed path.
    #[must_use]
    pub const fn new(path: JsonPath, store_as: Option<String>) -> Self {
        Self { path, store_as }
    }

    /// Builds the stage from `expr` (default `$`) and `store_as`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        let raw = config.expr.as_deref().unwrap_or("$");
        let path = JsonPath::parse(raw)
            .map_err(|e| MonitorError::invalid_expression(Self::TYPE, raw, e))?;
        Ok(Self::new(path, config.store_as.clone()))
    }
}

#[async_trait]
impl Stage for JsonPathStage {
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

        let mut matches = self.path.select(&doc);
        if matches.is_empty() {
            return Outcome::down(format!("No matches for: {}", self.path))
                .with_detail("expression", self.path.as_str())
                .with_detail("matches", Value::Array(Vec::new()));
        }

        let match_count = matches.len();
        let value = if match_count == 1 {
            matches.remove(0)
        } else {
            Value::Array(matches.clone())
        };
        if let Some(key) = &self.store_as {
            ctx.store(key.clone(), value.clone());
        }
        matches.truncate(MAX_REPORTED_MATCHES);

        Outcome::up(format!("extracted: {}", display_value(&value)))
            .with_detail("expression", self.path.as_str())
            .with_detail("value", value)
            .with_detail("match_count", match_count)
            .with_detail("matches", matches)
    }
}
