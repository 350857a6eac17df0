//! Numeric threshold assertion.

use super::Stage;
use crate::config::ProbeSettings;
use crate::context::{CheckContext, ELAPSED_MS_REF};
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::expr::display_value;
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use serde_json::Value;

/// Asserts that a referenced value lies within `[min, max]`.
///
/// Either bound may be omitted. The reference defaults to `$elapsed_ms`.
#[derive(Debug, Clone)]
pub struct ThresholdStage {
    value_ref: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl ThresholdStage {
    /// Type identifier.
    pub const TYPE: &'static str = "threshold";

    /// Creates the stage.
    #[must_use]
    pub fn new(value_ref: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            value_ref: value_ref.into(),
            min,
            max,
        }
    }

    /// Builds the stage from `value`, `min` and `max`.
    pub fn from_config(config: &StageConfig, _: &ProbeSettings) -> Result<Self, MonitorError> {
        if let (Some(min), Some(max)) = (config.min, config.max) {
            if min > max {
                return Err(MonitorError::invalid_config(
                    Self::TYPE,
                    format!("min {min} is greater than max {max}"),
                ));
            }
        }
        Ok(Self::new(
            config.value.as_deref().unwrap_or(ELAPSED_MS_REF),
            config.min,
            config.max,
        ))
    }
}

#[async_trait]
impl Stage for ThresholdStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    async fn check(&self, _target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(value) = ctx.resolve(&self.value_ref) else {
            return Outcome::down(format!("Value not found: {}", self.value_ref))
                .with_detail("value_ref", self.value_ref.as_str())
                .with_detail("error", "Value not found");
        };

        let Some(number) = coerce_number(&value) else {
            return Outcome::down(format!("Non-numeric value: {}", display_value(&value)))
                .with_detail("value_ref", self.value_ref.as_str())
                .with_detail("value", value)
                .with_detail("error", "Not a number");
        };

        let n = format_number(number);
        let outcome = match (self.min, self.max) {
            (Some(min), _) if number < min => Outcome::down(format!("{n} < {}", format_number(min))),
            (_, Some(max)) if number > max => Outcome::down(format!("{n} > {}", format_number(max))),
            (Some(min), Some(max)) => Outcome::up(format!(
                "{} <= {n} <= {}",
                format_number(min),
                format_number(max)
            )),
            (Some(min), None) => Outcome::up(format!("{n} >= {}", format_number(min))),
            (None, Some(max)) => Outcome::up(format!("{n} <= {}", format_number(max))),
            (None, None) => Outcome::up(format!("value={n}")),
        };

        outcome
            .with_detail("value_ref", self.value_ref.as_str())
            .with_detail("value", number)
            .with_detail("min", self.min)
            .with_detail("max", self.max)
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Formats a float with at least one decimal place, e.g. `500.0`.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
