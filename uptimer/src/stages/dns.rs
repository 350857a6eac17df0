//! DNS resolution probe.

use super::{elapsed_ms, Stage};
use crate::config::{timeout_duration, ProbeSettings};
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use crate::utils::host_and_port;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Instant;
use tracing::debug;

/// Resolves the target hostname, optionally asserting an expected address.
#[derive(Debug, Clone)]
pub struct DnsStage {
    expected_ip: Option<String>,
    timeout_secs: f64,
}

impl DnsStage {
    /// Type identifier.
    pub const TYPE: &'static str = "dns";

    /// Creates the stage.
    #[must_use]
    pub fn new(expected_ip: Option<String>, timeout_secs: f64) -> Self {
        Self {
            expected_ip: expected_ip.filter(|ip| !ip.is_empty()),
            timeout_secs,
        }
    }

    /// Builds the stage from `expected_ip` and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self::new(
            config.expected_ip.clone(),
            config.timeout.unwrap_or(settings.dns_timeout_secs),
        ))
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, String> {
        let lookup = tokio::net::lookup_host((host, 0));
        let addrs = tokio::time::timeout(timeout_duration(self.timeout_secs), lookup)
            .await
            .map_err(|_| "timed out".to_string())?
            .map_err(|e| e.to_string())?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        Ok(ips)
    }
}

#[async_trait]
impl Stage for DnsStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, ctx: &mut CheckContext) -> Outcome {
        let Some(endpoint) = host_and_port(target, &[]) else {
            return Outcome::down("Invalid URL: no hostname")
                .with_detail("error", "Could not parse hostname from URL");
        };
        let host = endpoint.host.as_str();

        debug!(host, "Resolving hostname");
        let start = Instant::now();
        let ips = match self.resolve(host).await {
            Ok(ips) => ips,
            Err(reason) => {
                return Outcome::down(format!("DNS resolution failed: {reason}"))
                    .with_detail("hostname", host)
                    .with_detail("error", reason);
            }
        };
        let elapsed = elapsed_ms(start);
        ctx.elapsed_ms = elapsed;

        let all: Vec<String> = ips.iter().map(ToString::to_string).collect();
        let ipv4: Vec<String> = ips.iter().filter(|ip| ip.is_ipv4()).map(ToString::to_string).collect();
        let ipv6: Vec<String> = ips.iter().filter(|ip| ip.is_ipv6()).map(ToString::to_string).collect();

        let outcome = match &self.expected_ip {
            Some(expected) if all.contains(expected) => {
                Outcome::up(format!("Resolved to {expected} (expected)"))
            }
            Some(expected) => Outcome::down(format!("Expected {expected}, got {all:?}")),
            None => {
                let primary = ipv4.first().or_else(|| ipv6.first()).map_or("unknown", String::as_str);
                Outcome::up(format!("Resolved to {primary}"))
            }
        };

        outcome
            .with_elapsed(elapsed)
            .with_detail("hostname", host)
            .with_detail("ipv4", ipv4)
            .with_detail("ipv6", ipv6)
            .with_detail("resolve_time_ms", elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use serde_json::json;

    #[tokio::test]
    async fn test_ip_literal_resolves_to_itself() {
        let mut ctx = CheckContext::new("t");
        let outcome = DnsStage::new(None, 2.0).check("https://127.0.0.1/x", &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.message, "Resolved to 127.0.0.1");
        assert_eq!(outcome.details.get("ipv4"), Some(&json!(["127.0.0.1"])));
        assert_eq!(outcome.details.get("ipv6"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_expected_ip() {
        let mut ctx = CheckContext::new("t");
        let ok = DnsStage::new(Some("127.0.0.1".into()), 2.0)
            .check("127.0.0.1", &mut ctx)
            .await;
        assert_eq!(ok.message, "Resolved to 127.0.0.1 (expected)");

        let bad = DnsStage::new(Some("10.0.0.1".into()), 2.0)
            .check("127.0.0.1", &mut ctx)
            .await;
        assert_eq!(bad.severity, Severity::Down);
        assert_eq!(bad.message, r#"Expected 10.0.0.1, got ["127.0.0.1"]"#);
    }

    #[tokio::test]
    async fn test_ipv6_literal() {
        let mut ctx = CheckContext::new("t");
        let outcome = DnsStage::new(None, 2.0).check("http://[::1]:8080", &mut ctx).await;
        assert_eq!(outcome.message, "Resolved to ::1");
        assert_eq!(outcome.details.get("ipv6"), Some(&json!(["::1"])));
    }

    #[test]
    fn test_empty_expected_ip_is_ignored() {
        let config = StageConfig {
            expected_ip: Some(String::new()),
            ..StageConfig::new("dns")
        };
        let stage = DnsStage::from_config(&config, &ProbeSettings::default()).unwrap();
        assert!(stage.expected_ip.is_none());
    }
}
