//! Probe settings shared by the network stages.

use crate::errors::MonitorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix of the environment variables read by [`ProbeSettings::from_env`].
pub const ENV_PREFIX: &str = "UPTIMER_";

/// Timeouts and HTTP client defaults for network stages.
///
/// Individual stages may still override their timeout through the `timeout`
/// field of their configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Timeout of the plain HTTP fetch stage, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: f64,
    /// Timeout of platform API stages, in seconds.
    #[serde(default = "default_platform_timeout")]
    pub platform_timeout_secs: f64,
    /// Timeout of the platform integrity stage, in seconds.
    #[serde(default = "default_integrity_timeout")]
    pub integrity_timeout_secs: f64,
    /// Timeout of TCP and TLS connections, in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_secs: f64,
    /// Timeout of DNS resolution, in seconds.
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout_secs: f64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User agent sent by HTTP stages.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> f64 {
    10.0
}

fn default_platform_timeout() -> f64 {
    30.0
}

fn default_integrity_timeout() -> f64 {
    60.0
}

fn default_socket_timeout() -> f64 {
    10.0
}

fn default_dns_timeout() -> f64 {
    10.0
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; Uptimer/1.0; +https://github.com/mortenoh/uptimer)".to_string()
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            platform_timeout_secs: default_platform_timeout(),
            integrity_timeout_secs: default_integrity_timeout(),
            socket_timeout_secs: default_socket_timeout(),
            dns_timeout_secs: default_dns_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

impl ProbeSettings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads defaults overridden by `UPTIMER_*` environment variables.
    ///
    /// Recognised variables: `UPTIMER_HTTP_TIMEOUT`, `UPTIMER_PLATFORM_TIMEOUT`,
    /// `UPTIMER_INTEGRITY_TIMEOUT`, `UPTIMER_SOCKET_TIMEOUT`,
    /// `UPTIMER_DNS_TIMEOUT`, `UPTIMER_MAX_REDIRECTS`, `UPTIMER_USER_AGENT`.
    pub fn from_env() -> Result<Self, MonitorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MonitorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut settings = Self::default();

        let timeouts: [(&str, &mut f64); 5] = [
            ("HTTP_TIMEOUT", &mut settings.http_timeout_secs),
            ("PLATFORM_TIMEOUT", &mut settings.platform_timeout_secs),
            ("INTEGRITY_TIMEOUT", &mut settings.integrity_timeout_secs),
            ("SOCKET_TIMEOUT", &mut settings.socket_timeout_secs),
            ("DNS_TIMEOUT", &mut settings.dns_timeout_secs),
        ];
        for (name, slot) in timeouts {
            if let Some(raw) = var(name) {
                *slot = parse_timeout(name, &raw)?;
            }
        }

        if let Some(raw) = var("MAX_REDIRECTS") {
            settings.max_redirects = raw.trim().parse().map_err(|_| {
                MonitorError::invalid_config(
                    format!("{ENV_PREFIX}MAX_REDIRECTS"),
                    format!("not a non-negative integer: {raw}"),
                )
            })?;
        }
        if let Some(agent) = var("USER_AGENT") {
            settings.user_agent = agent;
        }

        Ok(settings)
    }

    /// Sets the HTTP fetch timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, seconds: f64) -> Self {
        self.http_timeout_secs = seconds;
        self
    }

    /// Sets the socket timeout.
    #[must_use]
    pub fn with_socket_timeout(mut self, seconds: f64) -> Self {
        self.socket_timeout_secs = seconds;
        self
    }

    /// Sets the maximum number of redirects.
    #[must_use]
    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}

fn parse_timeout(name: &str, raw: &str) -> Result<f64, MonitorError> {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(secs),
        _ => Err(MonitorError::invalid_config(
            format!("{ENV_PREFIX}{name}"),
            format!("not a positive number of seconds: {raw}"),
        )),
    }
}

/// Converts a timeout in seconds into a `Duration`, ignoring junk values.
#[must_use]
pub fn timeout_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::from_secs(10))
}
