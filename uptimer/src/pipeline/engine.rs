//! Sequential pipeline execution.
//!
//! Stages run one after another on the caller's task, sharing a single
//! [`CheckContext`]. A failing stage never stops the run: each stage runs
//! exactly once and its outcome is folded into the aggregate.

use super::result::{RunResult, MESSAGE_SEPARATOR, VALUES_KEY};
use super::StageConfig;
use crate::context::CheckContext;
use crate::core::{Outcome, Severity};
use crate::errors::MonitorError;
use crate::stages::{default_registry, Stage, StageRegistry};
use crate::utils::now_utc;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An ordered list of built stages.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<(String, Box<dyn Stage>)>,
    detail_keys: Vec<String>,
}

impl Pipeline {
    /// Creates a pipeline from built stages, keyed by their own type.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        let stages: Vec<_> = stages
            .into_iter()
            .map(|stage| (stage.stage_type().to_string(), stage))
            .collect();
        Self::from_typed(stages)
    }

    fn from_typed(stages: Vec<(String, Box<dyn Stage>)>) -> Self {
        let types: Vec<&str> = stages.iter().map(|(t, _)| t.as_str()).collect();
        let detail_keys = detail_keys(&types);
        Self {
            stages,
            detail_keys,
        }
    }

    /// Builds every configured stage with `registry`.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error; nothing runs in that case.
    pub fn from_configs(
        registry: &StageRegistry,
        configs: &[StageConfig],
    ) -> Result<Self, MonitorError> {
        let stages = configs
            .iter()
            .map(|config| Ok((config.stage_type.clone(), registry.build(config)?)))
            .collect::<Result<Vec<_>, MonitorError>>()?;
        Ok(Self::from_typed(stages))
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage types in execution order.
    #[must_use]
    pub fn stage_types(&self) -> Vec<&str> {
        self.stages.iter().map(|(t, _)| t.as_str()).collect()
    }

    /// Runs every stage against `target` and aggregates the outcomes.
    pub async fn run(&self, target: &str) -> RunResult {
        let run_id = Uuid::new_v4();
        let checked_at = now_utc();
        let start = Instant::now();
        let mut ctx = CheckContext::new(target);

        let mut status = Severity::Up;
        let mut elapsed_ms = 0.0;
        let mut messages = Vec::with_capacity(self.stages.len());
        let mut details = Map::new();

        for ((stage_type, stage), key) in self.stages.iter().zip(&self.detail_keys) {
            debug!(run_id = %run_id, stage = %stage_type, "Running stage");
            let outcome = run_contained(stage.as_ref(), stage_type, target, &mut ctx).await;

            elapsed_ms += outcome.elapsed_ms;
            status = status.max(outcome.severity);
            messages.push(format!("{stage_type}: {}", outcome.message));
            details.insert(key.clone(), Value::Object(outcome.details));
        }

        if !ctx.values.is_empty() {
            details.insert(VALUES_KEY.to_string(), Value::Object(ctx.values));
        }

        info!(
            run_id = %run_id,
            url = %target,
            status = %status,
            elapsed_ms,
            stages = self.stages.len(),
            wall_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Pipeline run finished"
        );

        RunResult {
            run_id,
            target: target.to_string(),
            checked_at,
            status,
            message: messages.join(MESSAGE_SEPARATOR),
            elapsed_ms,
            details,
        }
    }
}

/// Runs a stage, turning a panic into a `Down` outcome.
async fn run_contained(
    stage: &dyn Stage,
    stage_type: &str,
    target: &str,
    ctx: &mut CheckContext,
) -> Outcome {
    match AssertUnwindSafe(stage.check(target, ctx)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!(stage = %stage_type, reason = %reason, "Stage panicked");
            Outcome::down(format!("stage panicked: {reason}")).with_detail("error", reason)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Details key per stage: the type itself, or `type_<index>` for types that
/// occur more than once.
fn detail_keys(types: &[&str]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in types {
        *counts.entry(*t).or_default() += 1;
    }
    types
        .iter()
        .enumerate()
        .map(|(i, t)| {
            if counts.get(t).copied().unwrap_or_default() > 1 {
                format!("{t}_{i}")
            } else {
                (*t).to_string()
            }
        })
        .collect()
}

/// Builds `configs` with the default registry and runs them against
/// `target`.
///
/// # Errors
///
/// Returns a configuration error if any stage cannot be built.
pub async fn run_pipeline(target: &str, configs: &[StageConfig]) -> Result<RunResult, MonitorError> {
    let registry = default_registry();
    let pipeline = Pipeline::from_configs(&registry, configs)?;
    Ok(pipeline.run(target).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::FnStage;
    use crate::testing::{CountingStage, PanickingStage, StaticStage};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_detail_keys_suffix_repeated_types() {
        assert_eq!(
            detail_keys(&["http", "jq", "jq", "threshold"]),
            vec!["http", "jq_1", "jq_2", "threshold"]
        );
    }

    #[tokio::test]
    async fn test_worst_status_and_message() {
        let pipeline = Pipeline::new(vec![
            Box::new(StaticStage::new("a", Outcome::up("fine").with_elapsed(1.5))),
            Box::new(StaticStage::new("b", Outcome::down("broken").with_elapsed(2.0))),
            Box::new(StaticStage::new("c", Outcome::degraded("slow").with_elapsed(0.5))),
        ]);
        let result = pipeline.run("example.org").await;
        assert_eq!(result.status, Severity::Down);
        assert_eq!(result.message, "a: fine; b: broken; c: slow");
        assert!((result.elapsed_ms - 4.0).abs() < f64::EPSILON);
        assert_eq!(result.target, "example.org");
    }

    #[tokio::test]
    async fn test_every_stage_runs_once_after_failure() {
        let first = CountingStage::new("first", Outcome::down("nope"));
        let second = CountingStage::new("second", Outcome::up("ok"));
        let (first_calls, second_calls) = (first.counter(), second.counter());

        let pipeline = Pipeline::new(vec![Box::new(first), Box::new(second)]);
        pipeline.run("t").await;
        pipeline.run("t").await;
        assert_eq!(first_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(second_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_stage_is_contained() {
        let pipeline = Pipeline::new(vec![
            Box::new(PanickingStage::new("boom", "exploded")),
            Box::new(StaticStage::new("after", Outcome::up("still ran"))),
        ]);
        let result = pipeline.run("t").await;
        assert_eq!(result.status, Severity::Down);
        assert_eq!(result.message, "boom: stage panicked: exploded; after: still ran");
    }

    #[tokio::test]
    async fn test_values_and_details_are_attached() {
        let registry = StageRegistry::with_defaults();
        let seed = FnStage::new("seed", |_: &str, ctx: &mut CheckContext| {
            ctx.body = Some(r#"{"a": 1, "b": "x"}"#.to_string());
            Outcome::up("seeded")
        });
        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(seed)];
        for (expr, key) in [(".a", "a"), (".b", "b")] {
            let config = StageConfig::new("jq").with_expr(expr).with_store_as(key);
            stages.push(registry.build(&config).unwrap());
        }
        let pipeline = Pipeline::new(stages);
        assert_eq!(pipeline.stage_types(), vec!["seed", "jq", "jq"]);

        let result = pipeline.run("t").await;
        assert!(result.details.contains_key("seed"));
        assert!(result.details.contains_key("jq_1"));
        assert!(result.details.contains_key("jq_2"));
        assert_eq!(
            result.values().cloned().map(Value::Object),
            Some(json!({"a": 1, "b": "x"}))
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_up() {
        let result = Pipeline::new(Vec::new()).run("t").await;
        assert_eq!(result.status, Severity::Up);
        assert_eq!(result.message, "");
        assert!(result.details.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_stage_fails_before_running() {
        let err = run_pipeline("t", &[StageConfig::new("threshold"), StageConfig::new("ftp")])
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::UnknownStage { .. }));
    }
}
