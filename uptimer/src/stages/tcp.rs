//! TCP port connectivity probe.

use super::{elapsed_ms, Stage};
use crate::config::{timeout_duration, ProbeSettings};
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use crate::utils::host_and_port;
use async_trait::async_trait;
use std::io;
use std::time::Instant;
use tokio::net::TcpStream;
use tracing::debug;

/// Opens a TCP connection to the target and closes it again.
///
/// The port comes from the stage configuration, then the target (`tcp://`
/// targets are accepted), then the scheme default.
#[derive(Debug, Clone)]
pub struct TcpStage {
    port: Option<u16>,
    timeout_secs: f64,
}

impl TcpStage {
    /// Type identifier.
    pub const TYPE: &'static str = "tcp";

    /// Creates the stage.
    #[must_use]
    pub const fn new(port: Option<u16>, timeout_secs: f64) -> Self {
        Self { port, timeout_secs }
    }

    /// Builds the stage from `port` and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self::new(
            config.port,
            config.timeout.unwrap_or(settings.socket_timeout_secs),
        ))
    }
}

#[async_trait]
impl Stage for TcpStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(endpoint) = host_and_port(target, &["tcp://"]) else {
            return Outcome::down("Invalid URL: no hostname")
                .with_detail("error", "Could not parse hostname from URL");
        };
        let host = endpoint.host.as_str();
        let port = self.port.unwrap_or_else(|| endpoint.port_or_scheme_default());

        debug!(host, port, "Opening TCP connection");
        let start = Instant::now();
        let connect = TcpStream::connect((host, port));
        let result = tokio::time::timeout(timeout_duration(self.timeout_secs), connect).await;

        let error = match result {
            Ok(Ok(stream)) => {
                let elapsed = elapsed_ms(start);
                drop(stream);
                ctx.elapsed_ms = elapsed;
                return Outcome::up(format!("Port {port} open ({elapsed:.1}ms)"))
                    .with_elapsed(elapsed)
                    .with_detail("hostname", host)
                    .with_detail("port", port)
                    .with_detail("connect_time_ms", elapsed);
            }
            Ok(Err(e)) => e,
            Err(_) => {
                return Outcome::down(format!("Port {port} timeout"))
                    .with_detail("hostname", host)
                    .with_detail("port", port)
                    .with_detail("error", "Connection timeout");
            }
        };

        let reason = error.to_string();
        debug!(host, port, error = %reason, "TCP connection failed");
        let message = if error.kind() == io::ErrorKind::ConnectionRefused {
            format!("Port {port} refused")
        } else if reason.contains("No route to host") {
            format!("No route to {host}")
        } else {
            format!("Port {port} error: {reason}")
        };

        Outcome::down(message)
            .with_detail("hostname", host)
            .with_detail("port", port)
            .with_detail("error", reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut ctx = CheckContext::new("t");
        let outcome = TcpStage::new(Some(port), 2.0)
            .check("http://127.0.0.1", &mut ctx)
            .await;
        assert_eq!(outcome.severity, Severity::Up);
        assert!(outcome.message.starts_with(&format!("Port {port} open (")));
        assert_eq!(outcome.details.get("port"), Some(&json!(port)));
        assert!(ctx.elapsed_ms > 0.0);
    }

    #[tokio::test]
    async fn test_port_from_tcp_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut ctx = CheckContext::new("t");
        let outcome = TcpStage::new(None, 2.0)
            .check(&format!("tcp://127.0.0.1:{port}"), &mut ctx)
            .await;
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.details.get("hostname"), Some(&json!("127.0.0.1")));
    }

    #[tokio::test]
    async fn test_closed_port_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut ctx = CheckContext::new("t");
        let outcome = TcpStage::new(Some(port), 2.0)
            .check("127.0.0.1", &mut ctx)
            .await;
        assert_eq!(outcome.severity, Severity::Down);
        assert_eq!(outcome.message, format!("Port {port} refused"));
    }

    #[tokio::test]
    async fn test_no_hostname() {
        let mut ctx = CheckContext::new("");
        let outcome = TcpStage::new(None, 1.0).check("", &mut ctx).await;
        assert_eq!(outcome.message, "Invalid URL: no hostname");
    }

    #[test]
    fn test_timeout_defaults_to_socket_setting() {
        let settings = ProbeSettings::default().with_socket_timeout(3.0);
        let stage = TcpStage::from_config(&StageConfig::new("tcp"), &settings).unwrap();
        assert!((stage.timeout_secs - 3.0).abs() < f64::EPSILON);
        assert!(stage.performs_network_io());
    }
}
