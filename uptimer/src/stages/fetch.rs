//! HTTP plumbing shared by the web and platform stages.

use crate::config::{timeout_duration, ProbeSettings};
use crate::context::{CheckContext, ResponseHeaders};
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use crate::utils::normalize_url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Username used by the platform stages when none is configured.
pub const DEFAULT_USERNAME: &str = "admin";

/// Password used by the platform stages when none is configured.
pub const DEFAULT_PASSWORD: &str = "district";

/// Path fragments stripped from a resolved platform URL.
const PLATFORM_SUFFIXES: [&str; 3] = ["/dhis-web-", "/login", "/#"];

/// Transport-level failure of a fetch.
#[derive(Debug, Error)]
pub(crate) enum FetchError {
    /// The connection could not be established.
    #[error("{0}")]
    Connect(String),

    /// Connecting took longer than the timeout.
    #[error("{0}")]
    ConnectTimeout(String),

    /// The response did not arrive in time.
    #[error("{0}")]
    ReadTimeout(String),

    /// The redirect chain exceeded the limit.
    #[error("Exceeded maximum allowed redirects ({0})")]
    TooManyRedirects(usize),

    /// Any other request failure.
    #[error("{0}")]
    Request(String),
}

impl FetchError {
    /// Short class name used as the outcome message.
    pub(crate) const fn class_name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "ConnectError",
            Self::ConnectTimeout(_) => "ConnectTimeout",
            Self::ReadTimeout(_) => "ReadTimeout",
            Self::TooManyRedirects(_) => "TooManyRedirects",
            Self::Request(_) => "RequestError",
        }
    }

    /// `Down` outcome describing the failure.
    pub(crate) fn to_outcome(&self) -> Outcome {
        Outcome::down(self.class_name()).with_detail("error", self.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        match (err.is_connect(), err.is_timeout()) {
            (true, true) => Self::ConnectTimeout(message),
            (true, false) => Self::Connect(message),
            (false, true) => Self::ReadTimeout(message),
            (false, false) => Self::Request(message),
        }
    }
}

/// One hop of a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hop {
    pub status: u16,
    pub location: String,
}

/// A fully received response.
#[derive(Debug, Clone)]
pub(crate) struct Fetched {
    pub status: u16,
    pub http_version: String,
    pub final_url: String,
    pub headers: ResponseHeaders,
    pub body: String,
    pub redirects: Vec<Hop>,
}

impl Fetched {
    /// Redirect chain as `[{status, location}]`.
    pub(crate) fn redirects_json(&self) -> Value {
        self.redirects
            .iter()
            .map(|hop| json!({"status": hop.status, "location": hop.location}))
            .collect()
    }

    /// Parses the body as JSON.
    pub(crate) fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Copies status, headers and body into the context.
    pub(crate) fn record(&self, ctx: &mut CheckContext, elapsed_ms: f64) {
        ctx.record_response(self.status, self.headers.clone(), self.body.clone(), elapsed_ms);
    }
}

/// Basic-auth credentials.
#[derive(Clone)]
pub(crate) struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Credentials from the stage config, falling back to the defaults.
    pub(crate) fn from_config(config: &StageConfig) -> Self {
        Self {
            username: config
                .username
                .clone()
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: config
                .password
                .clone()
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        }
    }
}

/// An HTTP client that follows redirects itself so the chain can be
/// reported.
#[derive(Debug, Clone)]
pub(crate) struct Fetcher {
    client: Client,
    max_redirects: usize,
    credentials: Option<Credentials>,
}

impl Fetcher {
    /// Builds a fetcher for `stage`.
    ///
    /// Custom headers are sent after the default `User-Agent` and may
    /// replace it.
    pub(crate) fn new(
        stage: &str,
        settings: &ProbeSettings,
        timeout_secs: f64,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<Self, MonitorError> {
        let mut default_headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&settings.user_agent)
            .map_err(|e| MonitorError::invalid_config(stage, format!("user agent: {e}")))?;
        default_headers.insert(USER_AGENT, agent);

        for (name, value) in headers.into_iter().flatten() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| MonitorError::invalid_config(stage, format!("header {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| MonitorError::invalid_config(stage, format!("header {name}: {e}")))?;
            default_headers.insert(header_name, header_value);
        }

        let timeout = timeout_duration(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::none())
            .default_headers(default_headers)
            .build()
            .map_err(|e| MonitorError::invalid_config(stage, format!("http client: {e}")))?;

        Ok(Self {
            client,
            max_redirects: settings.max_redirects,
            credentials: None,
        })
    }

    /// Sends basic auth to the origin host.
    #[must_use]
    pub(crate) fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// GETs `url` (bare hosts get `https://`), following redirects.
    pub(crate) async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        let mut current =
            Url::parse(&normalize_url(url)).map_err(|e| FetchError::Request(e.to_string()))?;
        let origin = current.host_str().map(str::to_string);
        let mut redirects = Vec::new();

        loop {
            let mut request = self.client.get(current.clone());
            if let Some(creds) = &self.credentials {
                if current.host_str().map(str::to_string) == origin {
                    request = request.basic_auth(&creds.username, Some(&creds.password));
                }
            }

            debug!(url = %current, "Sending request");
            let response = request.send().await?;
            let status = response.status();

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let (true, Some(location)) = (status.is_redirection(), location) {
                if redirects.len() >= self.max_redirects {
                    return Err(FetchError::TooManyRedirects(self.max_redirects));
                }
                let next = current
                    .join(&location)
                    .map_err(|e| FetchError::Request(format!("bad redirect {location}: {e}")))?;
                redirects.push(Hop {
                    status: status.as_u16(),
                    location,
                });
                current = next;
                continue;
            }

            let http_version = format!("{:?}", response.version());
            let final_url = response.url().to_string();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect::<ResponseHeaders>();
            let body = response.text().await?;

            return Ok(Fetched {
                status: status.as_u16(),
                http_version,
                final_url,
                headers,
                body,
                redirects,
            });
        }
    }
}

/// Strips trailing slashes and any known login or UI path from a resolved
/// platform URL.
pub(crate) fn platform_base_url(final_url: &str) -> String {
    let trimmed = final_url.trim_end_matches('/');
    PLATFORM_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.find(suffix).map(|idx| &trimmed[..idx]))
        .unwrap_or(trimmed)
        .to_string()
}
