//! # Uptimer
//!
//! A stage pipeline engine for uptime and platform health checks.
//!
//! A monitor is a target plus an ordered list of stage configurations. Each
//! run builds the stages, executes them one after another against the
//! target and folds their outcomes into a single result:
//!
//! - **Network stages** probe the target (HTTP, TCP, DNS, TLS certificates,
//!   DHIS2 platform APIs) and record what they received
//! - **Extraction stages** pull values out of the response with jq-like,
//!   JSONPath or regex expressions and store them under a name
//! - **Assertion stages** judge stored values, bodies and headers
//!
//! The worst stage severity becomes the status of the run, and every stage
//! runs even when an earlier one failed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use uptimer::prelude::*;
//!
//! let configs = vec![
//!     StageConfig::new("http"),
//!     StageConfig::new("jq").with_expr(".version").with_store_as("version"),
//!     StageConfig::new("threshold").with_bounds(None, Some(500.0)),
//! ];
//!
//! let result = run_pipeline("https://status.example.org", &configs).await?;
//! println!("{}: {}", result.status, result.message);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod expr;
pub mod interfaces;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ProbeSettings;
    pub use crate::context::{CheckContext, ResponseHeaders};
    pub use crate::core::{Outcome, Severity};
    pub use crate::errors::MonitorError;
    pub use crate::expr::{capture, extract, select, ExprError};
    pub use crate::interfaces::{
        run_monitor_check, AlertSink, InMemoryMonitorStore, Monitor, MonitorStore, ResultRecord,
    };
    pub use crate::pipeline::{run_pipeline, Pipeline, RunResult, StageConfig};
    pub use crate::stages::{default_registry, Stage, StageRegistry};
    pub use crate::utils::{now_utc, Timestamp};
}
