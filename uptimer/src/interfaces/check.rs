//! Scheduled check entry point.

use super::{should_send_alert, AlertSink, MonitorStore, ResultRecord};
use crate::errors::MonitorError;
use crate::pipeline::Pipeline;
use crate::stages::StageRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs one check of `monitor_id`, persists it and notifies `alerts` when
/// the status changed.
///
/// Returns `None` when the monitor does not exist or is disabled; the
/// pipeline is not run in either case.
///
/// # Errors
///
/// Returns configuration errors from building the pipeline and any store
/// failure.
pub async fn run_monitor_check(
    store: &dyn MonitorStore,
    registry: &StageRegistry,
    monitor_id: &str,
    alerts: &[Arc<dyn AlertSink>],
) -> Result<Option<ResultRecord>, MonitorError> {
    let Some(monitor) = store.get_monitor(monitor_id).await? else {
        warn!(monitor_id = %monitor_id, "Monitor not found for scheduled check");
        return Ok(None);
    };
    if !monitor.enabled {
        debug!(monitor_id = %monitor_id, name = %monitor.name, "Skipping disabled monitor");
        return Ok(None);
    }

    info!(monitor_id = %monitor_id, name = %monitor.name, "Running scheduled check");
    let pipeline = Pipeline::from_configs(registry, &monitor.pipeline)?;
    let record = ResultRecord::from_run(monitor_id, pipeline.run(&monitor.url).await);

    store.add_result(record.clone()).await.map_err(|e| {
        warn!(monitor_id = %monitor_id, error = %e, "Failed to store check result");
        e
    })?;
    store
        .update_monitor_status(monitor_id, record.status, record.checked_at)
        .await
        .map_err(|e| {
            warn!(monitor_id = %monitor_id, error = %e, "Failed to update monitor status");
            e
        })?;

    info!(
        monitor_id = %monitor_id,
        name = %monitor.name,
        status = %record.status,
        elapsed_ms = record.elapsed_ms,
        "Scheduled check completed"
    );

    if let Some(previous) = monitor.last_status {
        if should_send_alert(Some(previous), record.status) {
            for sink in alerts {
                sink.notify(previous, record.status, &monitor, &record).await;
            }
        }
    }

    Ok(Some(record))
}
