//! Core value types shared by stages and the pipeline engine.

mod outcome;
mod status;

pub use outcome::Outcome;
pub use status::Severity;
