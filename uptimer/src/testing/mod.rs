//! Testing utilities for monitor pipelines.
//!
//! This module provides:
//! - Mock stages with fixed, counted or panicking behavior
//! - A local HTTP fixture server for the network stages

mod fixtures;
mod mocks;

pub use fixtures::{FixtureServer, RecordedRequest, Route};
pub use mocks::{CountingStage, PanickingStage, StaticStage};
