//! Stage trait and implementations.
//!
//! A stage is one inspection step of a pipeline. Network stages probe the
//! target and record what they received in the [`CheckContext`]; pure
//! stages extract from or assert on what earlier stages recorded.

use crate::context::CheckContext;
use crate::core::Outcome;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Instant;

mod age;
mod contains;
mod dns;
mod header;
mod jq;
mod jsonpath;
mod regex_extract;
mod registry;
mod schema;
mod tcp;
mod threshold;

#[cfg(feature = "network")]
mod dhis2;
#[cfg(feature = "network")]
mod dhis2_checks;
#[cfg(feature = "network")]
mod fetch;
#[cfg(feature = "network")]
mod http;
#[cfg(feature = "network")]
mod tls;

pub use age::AgeStage;
pub use contains::ContainsStage;
pub use dns::DnsStage;
pub use header::HeaderStage;
pub use jq::JqStage;
pub use jsonpath::JsonPathStage;
pub use regex_extract::RegexStage;
pub use registry::{clear_default_registry, default_registry, factory, StageFactory, StageRegistry};
pub use schema::{validate_schema, JsonSchemaStage};
pub use tcp::TcpStage;
pub use threshold::ThresholdStage;

#[cfg(feature = "network")]
pub use dhis2::Dhis2Stage;
#[cfg(feature = "network")]
pub use dhis2_checks::{
    parse_platform_version, Dhis2AnalyticsStage, Dhis2IntegrityStage, Dhis2JobStage,
    Dhis2VersionStage,
};
#[cfg(feature = "network")]
pub use http::HttpStage;
#[cfg(feature = "network")]
pub use tls::TlsStage;

/// Trait for pipeline stages.
///
/// `check` never fails: every problem it runs into, from a refused
/// connection to a missing response body, is reported as a `Down` or
/// `Degraded` outcome. Stages must not keep the context beyond the call.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the type identifier of the stage.
    fn stage_type(&self) -> &str;

    /// Returns true if the stage talks to the network. Informational only.
    fn performs_network_io(&self) -> bool {
        false
    }

    /// Checks the target.
    ///
    /// # Arguments
    ///
    /// * `target` - The address being monitored
    /// * `ctx` - State shared with the other stages of this run
    async fn check(&self, target: &str, ctx: &mut CheckContext) -> Outcome;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&str, &mut CheckContext) -> Outcome + Send + Sync,
{
    stage_type: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&str, &mut CheckContext) -> Outcome + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(stage_type: impl Into<String>, func: F) -> Self {
        Self {
            stage_type: stage_type.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&str, &mut CheckContext) -> Outcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("stage_type", &self.stage_type)
            .finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&str, &mut CheckContext) -> Outcome + Send + Sync,
{
    fn stage_type(&self) -> &str {
        &self.stage_type
    }

    async fn check(&self, target: &str, ctx: &mut CheckContext) -> Outcome {
        (self.func)(target, ctx)
    }
}

/// Milliseconds elapsed since `start`.
pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Outcome shared by pure stages that need a response body.
pub(crate) fn missing_body(message: &str) -> Outcome {
    Outcome::down(message).with_detail("error", "Context or response body missing")
}
