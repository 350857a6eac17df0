//! Error types for the uptimer engine.
//!
//! Only configuration-time failures surface as errors. Anything that goes
//! wrong while a stage is checking a target becomes a `Down` or `Degraded`
//! [`Outcome`](crate::core::Outcome) instead.

use crate::expr::ExprError;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for uptimer operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A stage type that is not present in the registry.
    #[error("unknown stage: {stage}. Available: {}", .available.join(", "))]
    UnknownStage {
        /// The requested stage type.
        stage: String,
        /// Registered stage types in registration order.
        available: Vec<String>,
    },

    /// An expression that failed to parse when its stage was built.
    #[error("invalid expression for {stage} stage ({expression}): {source}")]
    InvalidExpression {
        /// Stage type owning the expression.
        stage: String,
        /// The raw expression text.
        expression: String,
        /// Parser error.
        #[source]
        source: ExprError,
    },

    /// A stage or settings value that cannot be used.
    #[error("invalid configuration for {stage}: {reason}")]
    InvalidConfig {
        /// Stage type or settings key.
        stage: String,
        /// What was wrong.
        reason: String,
    },

    /// A storage collaborator failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MonitorError {
    /// Creates an unknown-stage error.
    #[must_use]
    pub fn unknown_stage(stage: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownStage {
            stage: stage.into(),
            available,
        }
    }

    /// Creates an invalid-expression error.
    #[must_use]
    pub fn invalid_expression(
        stage: impl Into<String>,
        expression: impl Into<String>,
        source: ExprError,
    ) -> Self {
        Self::InvalidExpression {
            stage: stage.into(),
            expression: expression.into(),
            source,
        }
    }

    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid_config(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised while a pipeline is being configured.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownStage { .. } | Self::InvalidExpression { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Short machine-readable code for the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownStage { .. } => "unknown_stage",
            Self::InvalidExpression { .. } => "invalid_expression",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Store(_) => "store",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Converts to a dictionary representation for API error bodies.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::from(self.code()));
        map.insert("message".to_string(), serde_json::Value::from(self.to_string()));

        match self {
            Self::UnknownStage { stage, available } => {
                map.insert("stage".to_string(), serde_json::Value::from(stage.as_str()));
                map.insert(
                    "available".to_string(),
                    serde_json::Value::from(available.clone()),
                );
            }
            Self::InvalidExpression {
                stage, expression, ..
            } => {
                map.insert("stage".to_string(), serde_json::Value::from(stage.as_str()));
                map.insert(
                    "expression".to_string(),
                    serde_json::Value::from(expression.as_str()),
                );
            }
            Self::InvalidConfig { stage, .. } => {
                map.insert("stage".to_string(), serde_json::Value::from(stage.as_str()));
            }
            Self::Store(_) | Self::Serialization(_) => {}
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stage_message() {
        let err = MonitorError::unknown_stage(
            "bogus",
            vec!["http".to_string(), "dns".to_string(), "tcp".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "unknown stage: bogus. Available: http, dns, tcp"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_expression_carries_source() {
        let err = MonitorError::invalid_expression(
            "jq",
            ".a | nope",
            ExprError::UnknownFunction {
                name: "nope".to_string(),
            },
        );
        assert!(err.to_string().contains("jq"));
        assert!(err.to_string().contains("nope"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_to_dict() {
        let err = MonitorError::unknown_stage("x", vec!["http".to_string()]);
        let dict = err.to_dict();
        assert_eq!(dict.get("code"), Some(&serde_json::json!("unknown_stage")));
        assert_eq!(dict.get("available"), Some(&serde_json::json!(["http"])));
    }

    #[test]
    fn test_store_error_is_not_configuration() {
        let err = MonitorError::Store("disk full".to_string());
        assert!(!err.is_configuration());
        assert_eq!(err.code(), "store");
    }
}
