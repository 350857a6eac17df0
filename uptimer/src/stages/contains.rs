//! Body containment assertion.

use super::{missing_body, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use regex::Regex;

/// Asserts that the body contains (or, negated, lacks) a pattern.
///
/// The pattern is used as a regex when it compiles and as a literal
/// substring otherwise.
#[derive(Debug, Clone)]
pub struct ContainsStage {
    pattern: String,
    regex: Option<Regex>,
    negate: bool,
}

impl ContainsStage {
    /// Type identifier.
    pub const TYPE: &'static str = "contains";

    /// Creates the stage.
    #[must_use]
    pub fn new(pattern: impl Into<String>, negate: bool) -> Self {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern).ok();
        Self {
            pattern,
            regex,
            negate,
        }
    }

    /// Builds the stage from `pattern` and `negate`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self::new(
            config.pattern.clone().unwrap_or_default(),
            config.negate,
        ))
    }

    /// Finds the first occurrence as `(matched text, character offset)`.
    fn find(&self, body: &str) -> Option<(String, usize)> {
        let (text, byte_start) = match &self.regex {
            Some(re) => re.find(body).map(|m| (m.as_str().to_string(), m.start()))?,
            None => body
                .find(&self.pattern)
                .map(|start| (self.pattern.clone(), start))?,
        };
        Some((text, body[..byte_start].chars().count()))
    }
}

#[async_trait]
impl Stage for ContainsStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    async fn check(&self, _target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(body) = ctx.body.as_deref() else {
            return missing_body("No response body to check");
        };

        if self.pattern.is_empty() {
            return Outcome::down("No pattern specified").with_detail("error", "Pattern is required");
        }

        let found = self.find(body);
        let mut details = serde_json::Map::new();
        details.insert("pattern".into(), self.pattern.as_str().into());
        details.insert("negate".into(), self.negate.into());
        if let Some((text, position)) = &found {
            details.insert("match".into(), text.as_str().into());
            details.insert("position".into(), (*position).into());
        }

        let pattern = &self.pattern;
        let outcome = match (self.negate, found.is_some()) {
            (false, true) => Outcome::up(format!("Pattern found: {pattern}")),
            (false, false) => Outcome::down(format!("Pattern not found: {pattern}")),
            (true, true) => Outcome::down(format!("Pattern found (should be absent): {pattern}")),
            (true, false) => Outcome::up(format!("Pattern absent (as expected): {pattern}")),
        };
        outcome.with_details(details)
    }
}
