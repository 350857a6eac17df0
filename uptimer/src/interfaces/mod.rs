//! Boundaries between the engine and the service around it.
//!
//! This module provides:
//! - Monitor definitions and stored check results
//! - The storage trait with an in-memory implementation
//! - Status change alerting
//! - The scheduled check entry point

mod alerts;
mod check;
mod monitor;
mod store;

pub use alerts::{build_webhook_payload, should_send_alert, AlertSink, LoggingAlertSink};
pub use check::run_monitor_check;
pub use monitor::{Monitor, ResultRecord, DEFAULT_INTERVAL_SECS};
pub use store::{InMemoryMonitorStore, MonitorStore};
