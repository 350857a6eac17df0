//! Status change alerting.

use super::{Monitor, ResultRecord};
use crate::core::Severity;
use crate::utils::{format_iso8601, now_utc};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

/// Receiver of status change notifications.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Called once per check whose status differs from the previous one.
    async fn notify(
        &self,
        previous: Severity,
        new: Severity,
        monitor: &Monitor,
        record: &ResultRecord,
    );
}

/// An alert sink that logs status changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAlertSink;

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn notify(
        &self,
        previous: Severity,
        new: Severity,
        monitor: &Monitor,
        record: &ResultRecord,
    ) {
        info!(
            monitor_id = %monitor.id,
            monitor_name = %monitor.name,
            previous_status = %previous,
            new_status = %new,
            message = %record.message,
            "Monitor status changed"
        );
    }
}

/// Whether a check going from `previous` to `new` warrants an alert.
///
/// The first check of a monitor never alerts.
#[must_use]
pub fn should_send_alert(previous: Option<Severity>, new: Severity) -> bool {
    previous.is_some_and(|previous| previous != new)
}

/// Builds the `status_change` webhook body.
#[must_use]
pub fn build_webhook_payload(
    monitor: &Monitor,
    record: &ResultRecord,
    previous: Severity,
    new: Severity,
) -> Value {
    json!({
        "event": "status_change",
        "timestamp": format_iso8601(&now_utc()),
        "monitor": {
            "id": monitor.id,
            "name": monitor.name,
            "url": monitor.url,
            "tags": monitor.tags,
        },
        "alert": {
            "previous_status": previous,
            "new_status": new,
            "message": record.message,
            "elapsed_ms": record.elapsed_ms,
        },
        "check": {
            "id": record.id,
            "checked_at": format_iso8601(&record.checked_at),
            "details": record.details,
        },
    })
}
