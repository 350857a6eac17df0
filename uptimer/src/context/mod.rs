//! Context threaded through a pipeline run.
//!
//! This module provides:
//! - [`CheckContext`], the mutable state one run's stages share
//! - [`ResponseHeaders`], a case-preserving header list

mod check;
mod headers;

pub use check::{CheckContext, ELAPSED_MS_REF};
pub use headers::ResponseHeaders;
