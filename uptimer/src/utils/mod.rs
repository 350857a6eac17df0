//! Utility functions for timestamps and targets.

pub mod target;
pub mod timestamps;

pub use target::{host_and_port, normalize_url, Endpoint};
pub use timestamps::{
    format_iso8601, now_utc, parse_iso8601, parse_timestamp, parse_timestamp_value, Timestamp,
    TimestampError,
};
