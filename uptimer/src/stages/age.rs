//! Timestamp freshness assertion.

use super::Stage;
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::expr::display_value;
use crate::pipeline::StageConfig;
use crate::utils::{format_iso8601, now_utc, parse_timestamp_value, Timestamp};
use async_trait::async_trait;

/// Default value reference of the age stage.
pub const DEFAULT_AGE_REF: &str = "$server_time";

/// Default maximum age in seconds.
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Asserts that a referenced timestamp is recent.
///
/// Numbers are read as Unix seconds; strings are tried against a fixed list
/// of layouts (see [`parse_timestamp`](crate::utils::parse_timestamp)).
#[derive(Debug, Clone)]
pub struct AgeStage {
    value_ref: String,
    max_age_secs: u64,
}

impl AgeStage {
    /// Type identifier.
    pub const TYPE: &'static str = "age";

    /// Creates the stage.
    #[must_use]
    pub fn new(value_ref: impl Into<String>, max_age_secs: u64) -> Self {
        Self {
            value_ref: value_ref.into(),
            max_age_secs,
        }
    }

    /// Builds the stage from `value` and `max_age`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self::new(
            config.value.as_deref().unwrap_or(DEFAULT_AGE_REF),
            config.max_age.unwrap_or(DEFAULT_MAX_AGE_SECS),
        ))
    }

    /// Evaluates a parsed timestamp against `now`.
    fn judge(&self, timestamp: Timestamp, now: Timestamp) -> Outcome {
        let age = now.signed_duration_since(timestamp);
        #[allow(clippy::cast_precision_loss)]
        let age_seconds = age.num_milliseconds() as f64 / 1000.0;
        let whole = age.num_seconds();
        let max = self.max_age_secs;

        let outcome = if whole < 0 || age_seconds < 0.0 {
            Outcome::degraded(format!("Timestamp is in the future by {}s", whole.abs()))
        } else if age_seconds > max as f64 {
            Outcome::down(format!("Too old: {whole}s > {max}s"))
        } else {
            Outcome::up(format!("Age: {whole}s (max: {max}s)"))
        };

        outcome
            .with_detail("value_ref", self.value_ref.as_str())
            .with_detail("timestamp", format_iso8601(&timestamp))
            .with_detail("age_seconds", age_seconds)
            .with_detail("max_age", max)
    }
}

#[async_trait]
impl Stage for AgeStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    async fn check(&self, _target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(value) = ctx.resolve(&self.value_ref) else {
            return Outcome::down(format!("Value not found: {}", self.value_ref))
                .with_detail("value_ref", self.value_ref.as_str())
                .with_detail("error", "Value not found");
        };

        match parse_timestamp_value(&value) {
            Ok(timestamp) => self.judge(timestamp, now_utc()),
            Err(_) => Outcome::down(format!(
                "Could not parse timestamp: {}",
                display_value(&value)
            ))
            .with_detail("value_ref", self.value_ref.as_str())
            .with_detail("value", display_value(&value))
            .with_detail("error", "Invalid timestamp format"),
        }
    }
}
