//! Mock stages for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::CheckContext;
use crate::core::Outcome;
use crate::stages::Stage;

/// A stage that always returns the same outcome.
#[derive(Debug)]
pub struct StaticStage {
    stage_type: String,
    outcome: Outcome,
}

impl StaticStage {
    /// Creates a stage returning `outcome`.
    #[must_use]
    pub fn new(stage_type: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            stage_type: stage_type.into(),
            outcome,
        }
    }
}

#[async_trait]
impl Stage for StaticStage {
    fn stage_type(&self) -> &str {
        &self.stage_type
    }

    async fn check(&self, _target: &str, _ctx: &mut CheckContext) -> Outcome {
        self.outcome.clone()
    }
}

/// A stage that counts how often it ran.
#[derive(Debug)]
pub struct CountingStage {
    inner: StaticStage,
    calls: Arc<AtomicUsize>,
}

impl CountingStage {
    /// Creates a counting stage returning `outcome`.
    #[must_use]
    pub fn new(stage_type: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            inner: StaticStage::new(stage_type, outcome),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle on the call counter, usable after the stage moved into a
    /// pipeline.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Stage for CountingStage {
    fn stage_type(&self) -> &str {
        self.inner.stage_type()
    }

    async fn check(&self, target: &str, ctx: &mut CheckContext) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.check(target, ctx).await
    }
}

/// A stage that panics with a fixed message.
#[derive(Debug)]
pub struct PanickingStage {
    stage_type: String,
    message: String,
}

impl PanickingStage {
    /// Creates a panicking stage.
    #[must_use]
    pub fn new(stage_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage_type: stage_type.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn stage_type(&self) -> &str {
        &self.stage_type
    }

    #[allow(clippy::panic)]
    async fn check(&self, _target: &str, _ctx: &mut CheckContext) -> Outcome {
        panic!("{}", self.message)
    }
}
