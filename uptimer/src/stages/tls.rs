//! TLS certificate expiry probe.

use super::Stage;
use crate::config::{timeout_duration, ProbeSettings};
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use crate::utils::{format_iso8601, host_and_port, now_utc, Timestamp};
use async_trait::async_trait;
use chrono::DateTime;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use x509_parser::prelude::{parse_x509_certificate, X509Certificate};

/// Days before expiry at which the stage turns `Degraded`.
pub const DEFAULT_WARN_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Error)]
enum TlsProbeError {
    #[error("{0}")]
    Handshake(String),

    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Connection(String),
}

impl TlsProbeError {
    fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::InvalidData => Self::Handshake(err.to_string()),
            _ => Self::Connection(err.to_string()),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Handshake(reason) => format!("SSL error: {reason}"),
            Self::Timeout => "Connection timeout".to_string(),
            Self::Connection(reason) => format!("Connection failed: {reason}"),
        }
    }
}

/// The fields of a leaf certificate the stage reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CertificateInfo {
    pub subject_cn: String,
    pub issuer_cn: String,
    pub not_before: Timestamp,
    pub not_after: Timestamp,
    pub serial_number: String,
}

impl CertificateInfo {
    fn from_der(der: &[u8]) -> Result<Self, TlsProbeError> {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| TlsProbeError::Handshake(format!("unreadable certificate: {e}")))?;
        let validity = cert.validity();
        let to_utc = |ts: i64| {
            DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| TlsProbeError::Handshake(format!("certificate time out of range: {ts}")))
        };
        Ok(Self {
            subject_cn: common_name(&cert, true),
            issuer_cn: common_name(&cert, false),
            not_before: to_utc(validity.not_before.timestamp())?,
            not_after: to_utc(validity.not_after.timestamp())?,
            serial_number: cert.raw_serial_as_string().replace(':', "").to_uppercase(),
        })
    }

    /// Whole days until expiry, rounded down (negative once expired).
    fn days_until_expiry(&self, now: Timestamp) -> i64 {
        self.not_after
            .signed_duration_since(now)
            .num_seconds()
            .div_euclid(SECONDS_PER_DAY)
    }

    fn judge(&self, host: &str, port: u16, warn_days: i64, now: Timestamp) -> Outcome {
        let days = self.days_until_expiry(now);
        let outcome = if days < 0 {
            Outcome::down(format!("Certificate expired {} days ago", days.abs()))
        } else if days <= warn_days {
            Outcome::degraded(format!("Certificate expires in {days} days"))
        } else {
            Outcome::up(format!("Valid, expires in {days} days"))
        };

        outcome
            .with_detail("hostname", host)
            .with_detail("port", port)
            .with_detail("subject_cn", self.subject_cn.as_str())
            .with_detail("issuer_cn", self.issuer_cn.as_str())
            .with_detail("not_before", format_iso8601(&self.not_before))
            .with_detail("not_after", format_iso8601(&self.not_after))
            .with_detail("days_until_expiry", days)
            .with_detail("serial_number", self.serial_number.as_str())
    }
}

fn common_name(cert: &X509Certificate<'_>, subject: bool) -> String {
    let name = if subject { cert.subject() } else { cert.issuer() };
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Completes a verified handshake and returns the leaf certificate (DER).
fn fetch_leaf_certificate(host: &str, port: u16, timeout: Duration) -> Result<Vec<u8>, TlsProbeError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| TlsProbeError::Connection(e.to_string()))?
        .next()
        .ok_or_else(|| TlsProbeError::Connection(format!("no address for {host}")))?;

    let mut sock = TcpStream::connect_timeout(&addr, timeout).map_err(|e| TlsProbeError::from_io(&e))?;
    sock.set_read_timeout(Some(timeout))
        .and_then(|()| sock.set_write_timeout(Some(timeout)))
        .map_err(|e| TlsProbeError::from_io(&e))?;

    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TlsProbeError::Handshake(format!("invalid server name: {host}")))?;
    let mut conn = ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| TlsProbeError::Handshake(e.to_string()))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut sock)
            .map_err(|e| TlsProbeError::from_io(&e))?;
    }

    conn.peer_certificates()
        .and_then(<[_]>::first)
        .map(|cert| cert.as_ref().to_vec())
        .ok_or_else(|| TlsProbeError::Handshake("No certificate returned".to_string()))
}

/// Connects over TLS and reports how long the server certificate remains
/// valid.
///
/// The chain is verified against the bundled web PKI roots, so an expired
/// or untrusted certificate fails the handshake and is `Down`.
#[derive(Debug, Clone)]
pub struct TlsStage {
    warn_days: i64,
    timeout_secs: f64,
}

impl TlsStage {
    /// Type identifier.
    pub const TYPE: &'static str = "ssl";

    /// Creates the stage.
    #[must_use]
    pub const fn new(warn_days: i64, timeout_secs: f64) -> Self {
        Self {
            warn_days,
            timeout_secs,
        }
    }

    /// Builds the stage from `warn_days` and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        let warn_days = config.warn_days.unwrap_or(DEFAULT_WARN_DAYS);
        if warn_days < 0 {
            return Err(MonitorError::invalid_config(
                Self::TYPE,
                format!("warn_days must not be negative, got {warn_days}"),
            ));
        }
        Ok(Self::new(
            warn_days,
            config.timeout.unwrap_or(settings.socket_timeout_secs),
        ))
    }
}

#[async_trait]
impl Stage for TlsStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, _ctx: &mut CheckContext) -> Outcome {
        let Some(endpoint) = host_and_port(target, &[]) else {
            return Outcome::down("Invalid URL: no hostname")
                .with_detail("error", "Could not parse hostname from URL");
        };
        let host = endpoint.host.clone();
        let port = endpoint.port.unwrap_or(443);
        let timeout = timeout_duration(self.timeout_secs);

        debug!(host = %host, port, "Fetching TLS certificate");
        let probe_host = host.clone();
        let fetched = tokio::task::spawn_blocking(move || {
            fetch_leaf_certificate(&probe_host, port, timeout)
                .and_then(|der| CertificateInfo::from_der(&der))
        })
        .await
        .unwrap_or_else(|e| Err(TlsProbeError::Connection(e.to_string())));

        match fetched {
            Ok(info) => info.judge(&host, port, self.warn_days, now_utc()),
            Err(e) => {
                debug!(host = %host, port, error = %e, "TLS probe failed");
                Outcome::down(e.message())
                    .with_detail("hostname", host)
                    .with_detail("port", port)
                    .with_detail("error", e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use crate::testing::FixtureServer;
    use chrono::{Duration as Days, TimeZone, Utc};
    use serde_json::json;

    fn cert(not_after: Timestamp) -> CertificateInfo {
        CertificateInfo {
            subject_cn: "example.org".into(),
            issuer_cn: "Test CA".into(),
            not_before: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            not_after,
            serial_number: "0A1B".into(),
        }
    }

    #[test]
    fn test_valid_certificate() {
        let now = Utc::now();
        let outcome = cert(now + Days::days(90) + Days::hours(1)).judge("example.org", 443, 30, now);
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.message, "Valid, expires in 90 days");
        assert_eq!(outcome.details.get("subject_cn"), Some(&json!("example.org")));
        assert_eq!(outcome.details.get("not_before"), Some(&json!("2024-01-01T00:00:00+00:00")));
    }

    #[test]
    fn test_expiring_soon_is_degraded() {
        let now = Utc::now();
        let outcome = cert(now + Days::days(10) + Days::hours(1)).judge("h", 443, 30, now);
        assert_eq!(outcome.severity, Severity::Degraded);
        assert_eq!(outcome.message, "Certificate expires in 10 days");
    }

    #[test]
    fn test_expired_is_down() {
        let now = Utc::now();
        let outcome = cert(now - Days::days(3) + Days::hours(1)).judge("h", 443, 30, now);
        assert_eq!(outcome.severity, Severity::Down);
        assert_eq!(outcome.message, "Certificate expired 3 days ago");
        assert_eq!(outcome.details.get("days_until_expiry"), Some(&json!(-3)));
    }

    #[test]
    fn test_negative_warn_days_rejected() {
        let config = StageConfig {
            warn_days: Some(-1),
            ..StageConfig::new("ssl")
        };
        assert!(TlsStage::from_config(&config, &ProbeSettings::default()).is_err());
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let port = FixtureServer::unused_port().await.unwrap();
        let mut ctx = CheckContext::new("t");
        let outcome = TlsStage::new(30, 2.0)
            .check(&format!("https://127.0.0.1:{port}"), &mut ctx)
            .await;
        assert_eq!(outcome.severity, Severity::Down);
        assert!(outcome.message.starts_with("Connection failed: "));
        assert_eq!(outcome.details.get("port"), Some(&json!(port)));
    }

    #[tokio::test]
    async fn test_no_hostname() {
        let mut ctx = CheckContext::new("t");
        let outcome = TlsStage::new(30, 1.0).check("https://", &mut ctx).await;
        assert_eq!(outcome.message, "Invalid URL: no hostname");
    }
}
