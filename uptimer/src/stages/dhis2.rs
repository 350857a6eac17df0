//! Authenticated health probe for DHIS2 instances.

use super::fetch::{platform_base_url, Credentials, FetchError, Fetched, Fetcher};
use super::{elapsed_ms, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::expr::display_value;
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::debug;

/// Path of the system info endpoint, relative to the instance base URL.
pub(crate) const SYSTEM_INFO_PATH: &str = "/api/system/info";

/// Authenticated client for one platform instance.
///
/// The instance base URL is found by fetching the target, following
/// redirects, and trimming the login or UI path from where it lands.
#[derive(Debug, Clone)]
pub(crate) struct PlatformClient {
    fetcher: Fetcher,
}

impl PlatformClient {
    pub(crate) fn from_config(
        stage: &str,
        config: &StageConfig,
        settings: &ProbeSettings,
        default_timeout_secs: f64,
    ) -> Result<Self, MonitorError> {
        let timeout = config.timeout.unwrap_or(default_timeout_secs);
        let fetcher = Fetcher::new(stage, settings, timeout, config.headers.as_ref())?
            .with_credentials(Credentials::from_config(config));
        Ok(Self { fetcher })
    }

    /// Resolves the base URL of the instance behind `target`.
    pub(crate) async fn base_url(&self, target: &str) -> Result<String, FetchError> {
        let landing = self.fetcher.get(target).await?;
        Ok(platform_base_url(&landing.final_url))
    }

    /// GETs `path` below `base_url`.
    pub(crate) async fn get(&self, base_url: &str, path: &str) -> Result<Fetched, FetchError> {
        self.fetcher.get(&format!("{base_url}{path}")).await
    }

    /// Resolves the base URL, then GETs `path` below it.
    pub(crate) async fn get_api(&self, target: &str, path: &str) -> Result<Fetched, FetchError> {
        let base = self.base_url(target).await?;
        debug!(base = %base, path, "Querying platform API");
        self.get(&base, path).await
    }
}

/// `Down` outcome for a rejected login.
pub(crate) fn auth_failed(elapsed: f64) -> Outcome {
    Outcome::down("Authentication failed")
        .with_elapsed(elapsed)
        .with_detail("error", "401 Unauthorized")
}

/// Reads `key` from a system info document, rendered as text.
pub(crate) fn info_field(info: &Map<String, Value>, key: &str, default: &str) -> String {
    info.get(key)
        .filter(|v| !v.is_null())
        .map_or_else(|| default.to_string(), display_value)
}

/// Logs in and reads the system info endpoint.
///
/// The system info response is recorded in the context so later stages
/// can extract from it.
#[derive(Debug, Clone)]
pub struct Dhis2Stage {
    client: PlatformClient,
}

impl Dhis2Stage {
    /// Type identifier.
    pub const TYPE: &'static str = "dhis2";

    /// Builds the stage from `username`, `password` and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self {
            client: PlatformClient::from_config(
                Self::TYPE,
                config,
                settings,
                settings.platform_timeout_secs,
            )?,
        })
    }
}

#[async_trait]
impl Stage for Dhis2Stage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, ctx: &mut CheckContext) -> Outcome {
        let start = Instant::now();
        let base_url = match self.client.base_url(target).await {
            Ok(base) => base,
            Err(e) => return e.to_outcome(),
        };
        let api_url = format!("{base_url}{SYSTEM_INFO_PATH}");
        let response = match self.client.get(&base_url, SYSTEM_INFO_PATH).await {
            Ok(response) => response,
            Err(e) => return e.to_outcome(),
        };
        let elapsed = elapsed_ms(start);
        response.record(ctx, elapsed);

        let status = response.status;
        let mut details = Map::new();
        details.insert("status_code".into(), status.into());
        details.insert("base_url".into(), base_url.into());
        details.insert("api_url".into(), api_url.into());

        let outcome = match status {
            401 => Outcome::down("Authentication failed"),
            200 => match response.json() {
                Some(Value::Object(info)) => {
                    let version = info_field(&info, "version", "unknown");
                    details.insert("version".into(), version.clone().into());
                    for (key, field) in [
                        ("revision", "revision"),
                        ("build_time", "buildTime"),
                        ("server_date", "serverDate"),
                        ("system_name", "systemName"),
                    ] {
                        details.insert(key.into(), info_field(&info, field, "unknown").into());
                    }
                    Outcome::up(version)
                }
                _ => Outcome::degraded("Invalid JSON response"),
            },
            code if code < 400 => Outcome::up(code.to_string()),
            code => Outcome::degraded(code.to_string()),
        };
        outcome.with_elapsed(elapsed).with_details(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use crate::testing::{FixtureServer, Route};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn system_info() -> Value {
        json!({
            "version": "2.40.3",
            "revision": "abc123",
            "buildTime": "2024-01-01T00:00:00.000",
            "serverDate": "2024-06-01T12:00:00.000",
            "systemName": "Sierra Leone"
        })
    }

    fn stage(config: StageConfig) -> Dhis2Stage {
        Dhis2Stage::from_config(&config, &ProbeSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_base_url_and_reads_info() {
        let server = FixtureServer::start(vec![
            Route::new("/").redirect_to("/dhis-web-login/"),
            Route::new("/dhis-web-login/").with_body("<html>login</html>"),
            Route::new("/api/system/info")
                .with_basic_auth("admin", "district")
                .with_json(system_info()),
        ])
        .await
        .unwrap();

        let mut ctx = CheckContext::new("t");
        let outcome = stage(StageConfig::new("dhis2")).check(&server.url("/"), &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Up);
        assert_eq!(outcome.message, "2.40.3");
        assert_eq!(outcome.details.get("base_url"), Some(&json!(server.base_url())));
        assert_eq!(
            outcome.details.get("api_url"),
            Some(&json!(server.url("/api/system/info")))
        );
        assert_eq!(outcome.details.get("system_name"), Some(&json!("Sierra Leone")));
        assert_eq!(ctx.status_code, Some(200));
        assert!(ctx.body.as_deref().unwrap_or_default().contains("2.40.3"));
    }

    #[tokio::test]
    async fn test_wrong_credentials() {
        let server = FixtureServer::start(vec![
            Route::new("/"),
            Route::new("/api/system/info")
                .with_basic_auth("admin", "district")
                .with_json(system_info()),
        ])
        .await
        .unwrap();

        let config = StageConfig::new("dhis2").with_credentials("admin", "wrong");
        let mut ctx = CheckContext::new("t");
        let outcome = stage(config).check(&server.url("/"), &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Down);
        assert_eq!(outcome.message, "Authentication failed");
        assert_eq!(ctx.status_code, Some(401));
    }

    #[tokio::test]
    async fn test_invalid_json_and_other_codes() {
        let server = FixtureServer::start(vec![
            Route::new("/"),
            Route::new("/api/system/info").with_body("not json"),
        ])
        .await
        .unwrap();
        let mut ctx = CheckContext::new("t");
        let outcome = stage(StageConfig::new("dhis2")).check(&server.url("/"), &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Degraded);
        assert_eq!(outcome.message, "Invalid JSON response");

        let server = FixtureServer::start(vec![Route::new("/")]).await.unwrap();
        let outcome = stage(StageConfig::new("dhis2")).check(&server.url("/"), &mut ctx).await;
        assert_eq!(outcome.severity, Severity::Degraded);
        assert_eq!(outcome.message, "404");
    }

    #[test]
    fn test_info_field_defaults() {
        let info = json!({"version": "2.39", "revision": null, "port": 8080});
        let info = info.as_object().unwrap();
        assert_eq!(info_field(info, "version", "unknown"), "2.39");
        assert_eq!(info_field(info, "revision", "unknown"), "unknown");
        assert_eq!(info_field(info, "port", ""), "8080");
        assert_eq!(info_field(info, "missing", ""), "");
    }
}
