//! Platform checks built on the DHIS2 web API: version floor, data
//! integrity, scheduled jobs and analytics freshness.

use super::dhis2::{auth_failed, info_field, PlatformClient, SYSTEM_INFO_PATH};
use super::fetch::Fetched;
use super::{elapsed_ms, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use crate::utils::{now_utc, parse_iso8601};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Instant;

/// Minimum version assumed when none is configured.
pub const DEFAULT_MIN_VERSION: &str = "2.38.0";

/// Maximum analytics age in seconds when none is configured.
pub const DEFAULT_ANALYTICS_MAX_AGE_SECS: u64 = 24 * 3600;

/// Parses a version like `2.40.1`, `2.40` or `40.1.0` into a triple.
///
/// Releases numbered 30 and above drop the leading `2.`, so `40.1.0` reads
/// as `(2, 40, 1)`. Anything without a leading `major.minor` is `(0, 0, 0)`.
///
/// # Examples
///
/// ```
/// use uptimer::stages::parse_platform_version;
///
/// assert_eq!(parse_platform_version("2.40.1"), (2, 40, 1));
/// assert_eq!(parse_platform_version("41.0.2"), (2, 41, 0));
/// assert_eq!(parse_platform_version("unknown"), (0, 0, 0));
/// ```
#[must_use]
pub fn parse_platform_version(version: &str) -> (u32, u32, u32) {
    fn leading_number(s: &str) -> Option<(u32, &str)> {
        let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if end == 0 {
            return None;
        }
        Some((s[..end].parse().ok()?, &s[end..]))
    }

    fn triple(version: &str) -> Option<(u32, u32, u32)> {
        let (major, rest) = leading_number(version)?;
        let (minor, rest) = leading_number(rest.strip_prefix('.')?)?;
        let patch = rest
            .strip_prefix('.')
            .and_then(leading_number)
            .map_or(0, |(patch, _)| patch);
        Some((major, minor, patch))
    }

    match triple(version) {
        Some((major, minor, _)) if major >= 30 => (2, major, minor),
        Some(triple) => triple,
        None => (0, 0, 0),
    }
}

/// Parses the body as a JSON object, or yields the `Degraded` outcome the
/// platform stages report for anything else.
fn json_object(response: &Fetched, elapsed: f64) -> Result<Map<String, Value>, Outcome> {
    match response.json() {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(invalid_json(response, elapsed)),
    }
}

fn invalid_json(response: &Fetched, elapsed: f64) -> Outcome {
    Outcome::degraded("Invalid JSON response")
        .with_elapsed(elapsed)
        .with_detail("status_code", response.status)
}

/// Asserts the platform version is at least `min_version`.
#[derive(Debug, Clone)]
pub struct Dhis2VersionStage {
    client: PlatformClient,
    min_version: String,
    min_parsed: (u32, u32, u32),
}

impl Dhis2VersionStage {
    /// Type identifier.
    pub const TYPE: &'static str = "dhis2-version";

    /// Builds the stage from credentials, `min_version` and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        let min_version = config
            .min_version
            .clone()
            .unwrap_or_else(|| DEFAULT_MIN_VERSION.to_string());
        Ok(Self {
            client: PlatformClient::from_config(
                Self::TYPE,
                config,
                settings,
                settings.platform_timeout_secs,
            )?,
            min_parsed: parse_platform_version(&min_version),
            min_version,
        })
    }
}

#[async_trait]
impl Stage for Dhis2VersionStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, _ctx: &mut CheckContext) -> Outcome {
        let start = Instant::now();
        let response = match self.client.get_api(target, SYSTEM_INFO_PATH).await {
            Ok(response) => response,
            Err(e) => return e.to_outcome(),
        };
        let elapsed = elapsed_ms(start);
        if response.status == 401 {
            return auth_failed(elapsed);
        }
        let info = match json_object(&response, elapsed) {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };

        let version = info_field(&info, "version", "unknown");
        let (major, minor, patch) = parse_platform_version(&version);
        let min = &self.min_version;
        let outcome = if (major, minor, patch) < self.min_parsed {
            Outcome::down(format!("Version {version} < {min}"))
        } else {
            Outcome::up(format!("Version {version} >= {min}"))
        };

        outcome
            .with_elapsed(elapsed)
            .with_detail("version", version.as_str())
            .with_detail("version_parsed", format!("{major}.{minor}.{patch}"))
            .with_detail("min_version", min.as_str())
            .with_detail("revision", info_field(&info, "revision", ""))
            .with_detail("build_time", info_field(&info, "buildTime", ""))
    }
}

/// Lists the data integrity checks the instance offers.
#[derive(Debug, Clone)]
pub struct Dhis2IntegrityStage {
    client: PlatformClient,
}

impl Dhis2IntegrityStage {
    /// Type identifier.
    pub const TYPE: &'static str = "dhis2-integrity";

    const PATH: &'static str = "/api/dataIntegrity";

    /// Builds the stage from credentials and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self {
            client: PlatformClient::from_config(
                Self::TYPE,
                config,
                settings,
                settings.integrity_timeout_secs,
            )?,
        })
    }
}

#[async_trait]
impl Stage for Dhis2IntegrityStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, _ctx: &mut CheckContext) -> Outcome {
        let start = Instant::now();
        let response = match self.client.get_api(target, Self::PATH).await {
            Ok(response) => response,
            Err(e) => return e.to_outcome(),
        };
        let elapsed = elapsed_ms(start);

        match response.status {
            401 => return auth_failed(elapsed),
            200 => {}
            code => {
                return Outcome::degraded(format!("Integrity check returned {code}"))
                    .with_elapsed(elapsed)
                    .with_detail("status_code", code);
            }
        }

        let (count, checks) = match response.json() {
            Some(Value::Array(list)) => (list.len(), Value::Array(list.into_iter().take(10).collect())),
            Some(other) => (0, other),
            None => return invalid_json(&response, elapsed),
        };

        Outcome::up(format!("{count} integrity checks available"))
            .with_elapsed(elapsed)
            .with_detail("check_count", count)
            .with_detail("checks", checks)
    }
}

/// Summarizes scheduled job configurations, optionally of one job type.
#[derive(Debug, Clone)]
pub struct Dhis2JobStage {
    client: PlatformClient,
    job_type: Option<String>,
}

impl Dhis2JobStage {
    /// Type identifier.
    pub const TYPE: &'static str = "dhis2-job";

    /// Builds the stage from credentials, `job_type` and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self {
            client: PlatformClient::from_config(
                Self::TYPE,
                config,
                settings,
                settings.platform_timeout_secs,
            )?,
            job_type: config.job_type.clone().filter(|t| !t.is_empty()),
        })
    }

    fn path(&self) -> String {
        match &self.job_type {
            Some(job_type) => format!("/api/jobConfigurations?filter=jobType:eq:{job_type}"),
            None => "/api/jobConfigurations".to_string(),
        }
    }
}

#[async_trait]
impl Stage for Dhis2JobStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, _ctx: &mut CheckContext) -> Outcome {
        let start = Instant::now();
        let response = match self.client.get_api(target, &self.path()).await {
            Ok(response) => response,
            Err(e) => return e.to_outcome(),
        };
        let elapsed = elapsed_ms(start);
        if response.status == 401 {
            return auth_failed(elapsed);
        }
        let data = match json_object(&response, elapsed) {
            Ok(data) => data,
            Err(outcome) => return outcome,
        };

        let jobs = data
            .get("jobConfigurations")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let last_status = |job: &Value, status: &str| {
            job.get("lastExecutedStatus").and_then(Value::as_str) == Some(status)
        };
        let enabled = jobs
            .iter()
            .filter(|job| job.get("enabled").and_then(Value::as_bool) == Some(true))
            .count();
        let running = jobs.iter().filter(|job| last_status(*job, "RUNNING")).count();
        let failed = jobs.iter().filter(|job| last_status(*job, "FAILED")).count();

        let outcome = if failed > 0 {
            Outcome::degraded(format!("{failed} jobs failed"))
        } else {
            Outcome::up(format!("{} jobs ({enabled} enabled)", jobs.len()))
        };
        outcome
            .with_elapsed(elapsed)
            .with_detail("total_jobs", jobs.len())
            .with_detail("enabled", enabled)
            .with_detail("running", running)
            .with_detail("failed", failed)
            .with_detail("job_type_filter", self.job_type.clone())
    }
}

/// Checks how long ago analytics tables were last generated.
#[derive(Debug, Clone)]
pub struct Dhis2AnalyticsStage {
    client: PlatformClient,
    max_age_secs: u64,
}

impl Dhis2AnalyticsStage {
    /// Type identifier.
    pub const TYPE: &'static str = "dhis2-analytics";

    /// Builds the stage from credentials, `max_age` (seconds) and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        Ok(Self {
            client: PlatformClient::from_config(
                Self::TYPE,
                config,
                settings,
                settings.platform_timeout_secs,
            )?,
            max_age_secs: config.max_age.unwrap_or(DEFAULT_ANALYTICS_MAX_AGE_SECS),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn max_age_hours(&self) -> f64 {
        self.max_age_secs as f64 / 3600.0
    }

    /// Judges the last successful run against `now`.
    fn judge(&self, last_success: &str, now: crate::utils::Timestamp) -> Outcome {
        let max_hours = self.max_age_hours();
        let Ok(finished) = parse_iso8601(last_success) else {
            return Outcome::degraded(format!(
                "Could not parse analytics timestamp: {last_success}"
            ));
        };

        #[allow(clippy::cast_precision_loss)]
        let age_hours = now.signed_duration_since(finished).num_seconds() as f64 / 3600.0;
        let outcome = if age_hours > max_hours {
            Outcome::degraded(format!(
                "Analytics {age_hours:.1}h old (max: {}h)",
                format_hours(max_hours)
            ))
        } else {
            Outcome::up(format!("Analytics {age_hours:.1}h old"))
        };
        outcome.with_detail("age_hours", (age_hours * 10.0).round() / 10.0)
    }
}

fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{hours:.0}")
    } else {
        format!("{hours:.1}")
    }
}

#[async_trait]
impl Stage for Dhis2AnalyticsStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, _ctx: &mut CheckContext) -> Outcome {
        let start = Instant::now();
        let response = match self.client.get_api(target, SYSTEM_INFO_PATH).await {
            Ok(response) => response,
            Err(e) => return e.to_outcome(),
        };
        let elapsed = elapsed_ms(start);
        if response.status == 401 {
            return auth_failed(elapsed);
        }
        let info = match json_object(&response, elapsed) {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };

        let last_success = info
            .get("lastAnalyticsTableSuccess")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        let mut details = Map::new();
        details.insert(
            "last_analytics_success".into(),
            info.get("lastAnalyticsTableSuccess").cloned().unwrap_or(Value::Null),
        );
        details.insert(
            "last_analytics_runtime".into(),
            info.get("lastAnalyticsTableRuntime").cloned().unwrap_or(Value::Null),
        );
        details.insert("max_age_hours".into(), self.max_age_hours().into());

        let outcome = match last_success {
            Some(last) => self.judge(last, now_utc()),
            None => Outcome::degraded("No analytics table generation recorded"),
        };
        let mut outcome = outcome.with_elapsed(elapsed);
        for (key, value) in details {
            outcome.details.entry(key).or_insert(value);
        }
        outcome
    }
}
