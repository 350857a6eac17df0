//! Aggregate result of a pipeline run.

use crate::core::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Details key holding the values stages stored during the run.
pub const VALUES_KEY: &str = "_values";

/// Separator between per-stage messages.
pub const MESSAGE_SEPARATOR: &str = "; ";

/// Result of running every stage of a pipeline against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique ID of this run.
    pub run_id: Uuid,
    /// The checked target.
    pub target: String,
    /// When the run started.
    pub checked_at: DateTime<Utc>,
    /// Worst severity over all stages.
    pub status: Severity,
    /// `"{type}: {message}"` per stage, joined with `"; "`.
    pub message: String,
    /// Sum of the stage elapsed times.
    pub elapsed_ms: f64,
    /// Stage details keyed by stage type, plus stored values under
    /// [`VALUES_KEY`].
    pub details: Map<String, Value>,
}

impl RunResult {
    /// Whether every stage was up.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }

    /// Details recorded by the stage under `key`.
    #[must_use]
    pub fn stage_details(&self, key: &str) -> Option<&Map<String, Value>> {
        self.details.get(key).and_then(Value::as_object)
    }

    /// Values stored by extraction stages, if any.
    #[must_use]
    pub fn values(&self) -> Option<&Map<String, Value>> {
        self.stage_details(VALUES_KEY)
    }

    /// The individual stage messages.
    #[must_use]
    pub fn stage_messages(&self) -> Vec<&str> {
        if self.message.is_empty() {
            return Vec::new();
        }
        self.message.split(MESSAGE_SEPARATOR).collect()
    }
}
