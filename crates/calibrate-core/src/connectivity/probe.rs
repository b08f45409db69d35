//! Active reachability probes

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::redirect::Policy;

use crate::error::{Error, Result};
use crate::util::is_http_url;

/// Default timeout of one probe request
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the remote health-check endpoint
pub const HEALTH_CHECK_PATH: &str = "/healthz";

/// Result of one reachability probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The remote store answered the health check
    Reachable,
    /// The request failed, timed out or was intercepted
    Unreachable,
    /// Probing is impossible here; fall back to the coarse network signal
    Unavailable,
}

/// Confirms real connectivity beyond the platform's online/offline signal
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> ProbeOutcome;
}

/// Used when no remote endpoint is configured.
///
/// There is nothing to reach, so the monitor stays offline whatever the
/// platform's network signal says.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRemoteEndpoint;

#[async_trait]
impl ReachabilityProbe for NoRemoteEndpoint {
    async fn probe(&self) -> ProbeOutcome {
        ProbeOutcome::Unreachable
    }
}

/// `GET {base_url}/healthz` with caching disabled and a short timeout
#[derive(Clone, Debug)]
pub struct HttpReachabilityProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpReachabilityProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !is_http_url(base_url) {
            return Err(Error::InvalidInput(
                "probe base URL must include http:// or https://".to_string(),
            ));
        }

        // Redirects are how captive portals answer; treat them as unreachable.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|error| Error::InvalidInput(format!("failed to build probe client: {error}")))?;

        Ok(Self {
            url: format!("{base_url}{HEALTH_CHECK_PATH}"),
            client,
        })
    }

    /// Health-check URL this probe requests
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachabilityProbe {
    async fn probe(&self) -> ProbeOutcome {
        let response = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => ProbeOutcome::Reachable,
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "Health check answered with non-success status");
                ProbeOutcome::Unreachable
            }
            Err(error) if error.is_builder() => {
                tracing::warn!("Health check request could not be built: {error}");
                ProbeOutcome::Unavailable
            }
            Err(error) => {
                tracing::debug!("Health check failed: {error}");
                ProbeOutcome::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn new_rejects_urls_without_scheme() {
        assert!(HttpReachabilityProbe::new("api.example.com", DEFAULT_PROBE_TIMEOUT).is_err());
        let probe = HttpReachabilityProbe::new("https://api.example.com/", DEFAULT_PROBE_TIMEOUT)
            .unwrap();
        assert_eq!(probe.url(), "https://api.example.com/healthz");
    }

    #[tokio::test]
    async fn healthy_endpoint_is_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let probe = HttpReachabilityProbe::new(&server.uri(), DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(probe.probe().await, ProbeOutcome::Reachable);
    }

    #[tokio::test]
    async fn redirecting_portal_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "http://portal.example/login"),
            )
            .mount(&server)
            .await;

        let probe = HttpReachabilityProbe::new(&server.uri(), DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(probe.probe().await, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_as_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let probe = HttpReachabilityProbe::new(&server.uri(), Duration::from_millis(50)).unwrap();
        assert_eq!(probe.probe().await, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn missing_endpoint_is_unreachable() {
        assert_eq!(NoRemoteEndpoint.probe().await, ProbeOutcome::Unreachable);
    }
}
