//! SMTP email channel

use super::{Alert, Notifier};
use crate::config::EmailConfig;
use crate::errors::{Result, WatchdogError};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    subject: String,
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(WatchdogError::Config("email notificator requires host".to_string()));
        }

        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>>>()?;

        if to.is_empty() {
            return Err(WatchdogError::Config(
                "email notificator requires at least one recipient".to_string(),
            ));
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| WatchdogError::Notify(format!("invalid SMTP relay {}: {}", config.host, e)))?
            .port(config.port)
            .timeout(Some(SMTP_TIMEOUT));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            subject: config.subject.clone(),
        })
    }

    /// Render the mail for one alert
    pub fn build_message(&self, alert: &Alert) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!(
                "{}: {} is {}",
                self.subject, alert.service_name, alert.direction
            ))
            .header(ContentType::TEXT_PLAIN);

        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        builder
            .body(alert.message())
            .map_err(|e| WatchdogError::Notify(format!("cannot build email: {}", e)))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| WatchdogError::Config(format!("invalid email address {:?}: {}", address, e)))
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let message = self.build_message(alert)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| WatchdogError::Notify(format!("SMTP delivery failed: {}", e)))?;

        debug!("Alert {} mailed to {} recipients", alert.id, self.to.len());
        Ok(())
    }
}
