//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage configurations as read from monitor definitions
//! - The sequential engine that builds and runs them
//! - The aggregate run result

mod engine;
mod result;
mod spec;

pub use engine::{run_pipeline, Pipeline};
pub use result::{RunResult, MESSAGE_SEPARATOR, VALUES_KEY};
pub use spec::StageConfig;
