//! Persistence boundary for monitors and their results.

use super::{Monitor, ResultRecord};
use crate::core::Severity;
use crate::errors::MonitorError;
use crate::utils::Timestamp;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage used by scheduled checks.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Loads a monitor, `None` if it does not exist.
    async fn get_monitor(&self, monitor_id: &str) -> Result<Option<Monitor>, MonitorError>;

    /// Appends a check result.
    async fn add_result(&self, record: ResultRecord) -> Result<(), MonitorError>;

    /// Records the latest status of a monitor.
    async fn update_monitor_status(
        &self,
        monitor_id: &str,
        status: Severity,
        checked_at: Timestamp,
    ) -> Result<(), MonitorError>;
}

/// Store keeping everything in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMonitorStore {
    monitors: RwLock<HashMap<String, Monitor>>,
    results: RwLock<Vec<ResultRecord>>,
}

impl InMemoryMonitorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a monitor.
    pub fn insert_monitor(&self, monitor: Monitor) {
        self.monitors.write().insert(monitor.id.clone(), monitor);
    }

    /// Results stored for `monitor_id`, oldest first.
    #[must_use]
    pub fn results_for(&self, monitor_id: &str) -> Vec<ResultRecord> {
        self.results
            .read()
            .iter()
            .filter(|r| r.monitor_id == monitor_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MonitorStore for InMemoryMonitorStore {
    async fn get_monitor(&self, monitor_id: &str) -> Result<Option<Monitor>, MonitorError> {
        Ok(self.monitors.read().get(monitor_id).cloned())
    }

    async fn add_result(&self, record: ResultRecord) -> Result<(), MonitorError> {
        self.results.write().push(record);
        Ok(())
    }

    async fn update_monitor_status(
        &self,
        monitor_id: &str,
        status: Severity,
        checked_at: Timestamp,
    ) -> Result<(), MonitorError> {
        let mut monitors = self.monitors.write();
        let monitor = monitors
            .get_mut(monitor_id)
            .ok_or_else(|| MonitorError::Store(format!("monitor not found: {monitor_id}")))?;
        monitor.last_status = Some(status);
        monitor.last_check = Some(checked_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::now_utc;

    #[tokio::test]
    async fn test_status_update() {
        let store = InMemoryMonitorStore::new();
        store.insert_monitor(Monitor::new("m1", "Docs", "https://docs.example.org"));

        let at = now_utc();
        store
            .update_monitor_status("m1", Severity::Degraded, at)
            .await
            .unwrap();
        let monitor = store.get_monitor("m1").await.unwrap().unwrap();
        assert_eq!(monitor.last_status, Some(Severity::Degraded));
        assert_eq!(monitor.last_check, Some(at));
    }

    #[tokio::test]
    async fn test_unknown_monitor() {
        let store = InMemoryMonitorStore::new();
        assert!(store.get_monitor("nope").await.unwrap().is_none());
        let err = store
            .update_monitor_status("nope", Severity::Up, now_utc())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store");
    }
}
