//! HTTP GET probe.

use super::fetch::Fetcher;
use super::{elapsed_ms, Stage};
use crate::config::ProbeSettings;
use crate::context::CheckContext;
use crate::core::Outcome;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

/// Fetches the target, following redirects, and records the response for
/// later stages.
///
/// Any status below 400 is `Up`; anything else is `Degraded`. Transport
/// failures are `Down` with the failure class as message.
#[derive(Debug, Clone)]
pub struct HttpStage {
    fetcher: Fetcher,
}

impl HttpStage {
    /// Type identifier.
    pub const TYPE: &'static str = "http";

    /// Builds the stage from `headers` and `timeout`.
    pub fn from_config(config: &StageConfig, settings: &ProbeSettings) -> Result<Self, MonitorError> {
        let timeout = config.timeout.unwrap_or(settings.http_timeout_secs);
        let fetcher = Fetcher::new(Self::TYPE, settings, timeout, config.headers.as_ref())?;
        Ok(Self { fetcher })
    }
}

#[async_trait]
impl Stage for HttpStage {
    fn stage_type(&self) -> &str {
        Self::TYPE
    }

    fn performs_network_io(&self) -> bool {
        true
    }

    async fn check(&self, target: &str, ctx: &mut CheckContext) -> Outcome {
        let start = Instant::now();
        let fetched = match self.fetcher.get(target).await {
            Ok(fetched) => fetched,
            Err(e) => {
                debug!(url = %target, error = %e, "HTTP request failed");
                return e.to_outcome();
            }
        };
        let elapsed = elapsed_ms(start);
        fetched.record(ctx, elapsed);

        let outcome = if fetched.status < 400 {
            Outcome::up(fetched.status.to_string())
        } else {
            Outcome::degraded(fetched.status.to_string())
        };

        let mut outcome = outcome
            .with_elapsed(elapsed)
            .with_detail("status_code", fetched.status)
            .with_detail("http_version", fetched.http_version.as_str())
            .with_detail("final_url", fetched.final_url.as_str());
        if let Some(server) = fetched.headers.get("server").filter(|s| !s.is_empty()) {
            outcome = outcome.with_detail("server", server);
        }
        if let Some(content_type) = fetched.headers.get("content-type").filter(|s| !s.is_empty()) {
            outcome = outcome.with_detail("content_type", content_type);
        }
        if !fetched.redirects.is_empty() {
            outcome = outcome.with_detail("redirects", fetched.redirects_json());
        }
        outcome
    }
}
