//! HTTP GET probe

use super::{Probe, ProbeOutcome};
use crate::errors::{Result, WatchdogError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Healthy when a GET on the url answers with a 2xx status
#[derive(Debug, Clone)]
pub struct WebProbe {
    client: Client,
    url: String,
    verbose: bool,
}

impl WebProbe {
    pub fn new(url: String, http_timeout: Duration, verbose: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(http_timeout)
            .user_agent(format!("svc_watchdog/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(WatchdogError::Http)?;

        Ok(Self {
            client,
            url,
            verbose,
        })
    }
}

#[async_trait]
impl Probe for WebProbe {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn ping(&mut self) -> ProbeOutcome {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::unhealthy(format!("GET {} failed: {}", self.url, e)),
        };

        let status = response.status();
        if self.verbose {
            debug!("web Ping status: {}", status.as_u16());
        }

        if status.is_success() {
            ProbeOutcome::Healthy
        } else {
            ProbeOutcome::unhealthy(format!("GET {} returned {}", self.url, status))
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.verbose {
            debug!("connect Web");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.verbose {
            debug!("close Web");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_status(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_success_status() {
        let server = server_with_status(200).await;
        let mut probe = WebProbe::new(format!("{}/health", server.uri()), Duration::from_secs(5), true).unwrap();

        assert_eq!(probe.ping().await, ProbeOutcome::Healthy);
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let server = server_with_status(503).await;
        let mut probe = WebProbe::new(format!("{}/health", server.uri()), Duration::from_secs(5), false).unwrap();

        match probe.ping().await {
            ProbeOutcome::Unhealthy(reason) => assert!(reason.contains("503")),
            ProbeOutcome::Healthy => panic!("503 must be unhealthy"),
        }
    }

    #[tokio::test]
    async fn test_unmatched_path_is_unhealthy() {
        let server = server_with_status(200).await;
        let mut probe = WebProbe::new(format!("{}/missing", server.uri()), Duration::from_secs(5), false).unwrap();

        assert!(!probe.ping().await.is_healthy());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let mut probe = WebProbe::new(server.uri(), Duration::from_millis(200), false).unwrap();
        assert!(!probe.ping().await.is_healthy());
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let mut probe = WebProbe::new("http://127.0.0.1:1/".to_string(), Duration::from_secs(1), false).unwrap();
        assert!(probe.connect().await.is_ok());
        assert!(!probe.ping().await.is_healthy());
        assert!(probe.close().await.is_ok());
    }
}
