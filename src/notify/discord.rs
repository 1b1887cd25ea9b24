//! Discord webhook channel

use super::{Alert, Notifier};
use crate::config::DiscordConfig;
use crate::errors::{Result, WatchdogError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: String,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: String,
    avatar_url: Option<String>,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        if config.webhook_url.is_empty() {
            return Err(WatchdogError::Config(
                "discord notificator requires webhookUrl".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .user_agent(format!("svc_watchdog/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(WatchdogError::Http)?;

        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        })
    }

    async fn handle_response(&self, response: Response, alert: &Alert) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            debug!("Alert {} accepted by discord", alert.id);
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

        let error_message = match status.as_u16() {
            400 => format!("Discord rejected alert {}: {}", alert.id, error_body),
            401 | 403 => format!("Discord webhook not authorized: {}", error_body),
            404 => format!("Discord webhook not found: {}", error_body),
            429 => format!("Discord rate limited alert {}: {}", alert.id, error_body),
            500..=599 => format!("Discord server error for alert {}: {}", alert.id, error_body),
            _ => format!("Unexpected discord response {} for alert {}: {}", status, alert.id, error_body),
        };

        Err(WatchdogError::Notify(error_message))
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = WebhookPayload {
            content: alert.message(),
            username: &self.username,
            avatar_url: self.avatar_url.as_deref(),
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(WatchdogError::Http)?;

        self.handle_response(response, alert).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::AlertDirection;
    use crate::service::ServiceKind;
    use chrono::Utc;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        Alert {
            id: Uuid::new_v4(),
            service_name: "cache".to_string(),
            kind: ServiceKind::Redis,
            url: "redis://cache:6379".to_string(),
            direction: AlertDirection::Up,
            down_since: None,
            downtime_minutes: Some(3),
            timestamp: Utc::now(),
        }
    }

    fn notifier(server: &MockServer) -> DiscordNotifier {
        DiscordNotifier::new(&DiscordConfig {
            enable: true,
            webhook_url: format!("{}/api/webhooks/1/abc", server.uri()),
            username: "watchdog".to_string(),
            avatar_url: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_rendered_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/1/abc"))
            .and(body_partial_json(serde_json::json!({
                "content": "cache (redis) redis://cache:6379 is UP, it was down for 3 minutes",
                "username": "watchdog"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        tokio_test::assert_ok!(notifier(&server).send(&alert()).await);
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let result = notifier(&server).send(&alert()).await;
        match result {
            Err(WatchdogError::Notify(msg)) => assert!(msg.contains("bad gateway")),
            other => panic!("expected notify error, got {:?}", other),
        }
    }

    #[test]
    fn test_requires_webhook_url() {
        let result = DiscordNotifier::new(&DiscordConfig::default());
        tokio_test::assert_err!(result);
    }
}
