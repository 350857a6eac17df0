//! Monitor definitions and persisted check results.

use crate::core::Severity;
use crate::pipeline::{RunResult, StageConfig};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Default check interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

fn default_pipeline() -> Vec<StageConfig> {
    vec![StageConfig::new("http")]
}

const fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

const fn default_enabled() -> bool {
    true
}

/// A monitored target and the pipeline checking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    /// Unique monitor ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The checked target.
    pub url: String,
    /// Stages run on every check; a single `http` stage by default.
    #[serde(default = "default_pipeline", alias = "checks")]
    pub pipeline: Vec<StageConfig>,
    /// Seconds between checks when no cron schedule is set.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Cron expression replacing the interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Disabled monitors are never checked.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Free-form grouping tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Status of the latest check; `None` before the first one.
    #[serde(default)]
    pub last_status: Option<Severity>,
    /// Time of the latest check.
    #[serde(default)]
    pub last_check: Option<Timestamp>,
}

impl Monitor {
    /// Creates an enabled monitor with the default pipeline.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            pipeline: default_pipeline(),
            interval: DEFAULT_INTERVAL_SECS,
            schedule: None,
            enabled: true,
            tags: Vec::new(),
            last_status: None,
            last_check: None,
        }
    }

    /// Replaces the pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Vec<StageConfig>) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Marks the monitor as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One stored check of a monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Record ID; the run ID of the check.
    pub id: Uuid,
    /// The checked monitor.
    pub monitor_id: String,
    /// Aggregate status.
    pub status: Severity,
    /// Joined stage messages.
    pub message: String,
    /// Summed stage time in milliseconds.
    pub elapsed_ms: f64,
    /// Per-stage details.
    pub details: Map<String, Value>,
    /// When the check ran.
    pub checked_at: Timestamp,
}

impl ResultRecord {
    /// Converts a pipeline run into a record for `monitor_id`.
    #[must_use]
    pub fn from_run(monitor_id: impl Into<String>, run: RunResult) -> Self {
        Self {
            id: run.run_id,
            monitor_id: monitor_id.into(),
            status: run.status,
            message: run.message,
            elapsed_ms: run.elapsed_ms,
            details: run.details,
            checked_at: run.checked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_monitor_defaults_from_json() {
        let monitor: Monitor = serde_json::from_value(json!({
            "id": "m1",
            "name": "Docs",
            "url": "https://docs.example.org"
        }))
        .unwrap();
        assert_eq!(monitor, Monitor::new("m1", "Docs", "https://docs.example.org"));
        assert_eq!(monitor.pipeline, vec![StageConfig::new("http")]);
        assert!(monitor.enabled);
    }

    #[test]
    fn test_checks_alias_and_status() {
        let monitor: Monitor = serde_json::from_value(json!({
            "id": "m1",
            "name": "API",
            "url": "https://api.example.org",
            "checks": [{"type": "http"}, {"type": "jq", "expr": ".status"}],
            "enabled": false,
            "last_status": "degraded"
        }))
        .unwrap();
        assert_eq!(monitor.pipeline.len(), 2);
        assert!(!monitor.enabled);
        assert_eq!(monitor.last_status, Some(Severity::Degraded));
    }

    #[test]
    fn test_record_from_run() {
        let run = RunResult {
            run_id: Uuid::new_v4(),
            target: "https://api.example.org".into(),
            checked_at: chrono::Utc::now(),
            status: Severity::Down,
            message: "http: ConnectError".into(),
            elapsed_ms: 3.5,
            details: Map::new(),
        };
        let record = ResultRecord::from_run("m1", run.clone());
        assert_eq!(record.id, run.run_id);
        assert_eq!(record.monitor_id, "m1");
        assert_eq!(record.status, Severity::Down);
        assert_eq!(record.checked_at, run.checked_at);
    }
}
