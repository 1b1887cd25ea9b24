//! Configuration management for the watchdog

use crate::errors::Result;
use crate::service::ServiceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Monitored targets keyed by service name
    #[serde(default)]
    pub service: BTreeMap<String, ServiceConfig>,

    /// Alert delivery channels
    #[serde(default)]
    pub notificator: NotificatorConfig,

    /// Upper bound for every probe I/O phase
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub kind: ServiceKind,

    #[serde(default)]
    pub url: String,

    /// Seconds between probes
    #[serde(default)]
    pub check_interval: u64,

    #[serde(default)]
    pub enable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificatorConfig {
    #[serde(default)]
    pub discord: Option<DiscordConfig>,

    #[serde(default)]
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub webhook_url: String,

    #[serde(default = "default_discord_username")]
    pub username: String,

    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub from: String,

    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default = "default_email_subject")]
    pub subject: String,
}

fn default_probe_timeout_seconds() -> u64 {
    5
}

fn default_discord_username() -> String {
    "svc-watchdog".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_email_subject() -> String {
    "Service status alert".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: BTreeMap::new(),
            notificator: NotificatorConfig::default(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse configuration from any JSON source
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Let environment variables override values read from the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(timeout) = env::var("WATCHDOG_PROBE_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse() {
                self.probe_timeout_seconds = seconds;
            }
        }

        if let Ok(webhook_url) = env::var("WATCHDOG_DISCORD_WEBHOOK_URL") {
            self.notificator
                .discord
                .get_or_insert_with(DiscordConfig::default)
                .webhook_url = webhook_url;
        }

        if let Ok(password) = env::var("WATCHDOG_EMAIL_PASSWORD") {
            if let Some(email) = self.notificator.email.as_mut() {
                email.password = password;
            }
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.probe_timeout_seconds == 0 {
            return Err("probeTimeoutSeconds must be greater than 0".to_string());
        }

        for (name, service) in self.service.iter().filter(|(_, s)| s.enable) {
            if service.check_interval == 0 {
                return Err(format!(
                    "service {} must have a checkInterval greater than 0",
                    name
                ));
            }

            if service.url.trim().is_empty() {
                return Err(format!("service {} must have a url", name));
            }
        }

        if let Some(discord) = self.notificator.discord.as_ref().filter(|d| d.enable) {
            if discord.webhook_url.is_empty() {
                return Err("discord notificator requires webhookUrl".to_string());
            }
        }

        if let Some(email) = self.notificator.email.as_ref().filter(|e| e.enable) {
            if email.host.is_empty() {
                return Err("email notificator requires host".to_string());
            }

            if email.from.is_empty() {
                return Err("email notificator requires from".to_string());
            }

            if email.to.is_empty() {
                return Err("email notificator requires at least one recipient".to_string());
            }
        }

        Ok(())
    }

    /// Number of services that will get a check loop
    pub fn enabled_services(&self) -> usize {
        self.service.values().filter(|s| s.enable).count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SAMPLE: &str = r#"{
        "service": {
            "api": { "kind": "web", "url": "http://localhost:8080/health", "checkInterval": 5, "enable": true },
            "cache": { "kind": "redis", "url": "redis://localhost:6379", "checkInterval": 10, "enable": true },
            "legacy": { "kind": "mysql", "url": "", "checkInterval": 0, "enable": false }
        },
        "notificator": {
            "discord": { "enable": true, "webhookUrl": "https://discord.example/hook" }
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(config.service.len(), 3);
        assert_eq!(config.enabled_services(), 2);
        assert_eq!(config.service["cache"].kind, ServiceKind::Redis);
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));

        let discord = config.notificator.discord.as_ref().unwrap();
        assert_eq!(discord.username, "svc-watchdog");
        assert!(config.notificator.email.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let raw = r#"{"service": {"x": {"kind": "oracle", "url": "a", "checkInterval": 1, "enable": true}}}"#;
        assert!(Config::from_reader(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_negative_interval_rejected() {
        let raw = r#"{"service": {"x": {"kind": "tcp", "url": "a:1", "checkInterval": -3, "enable": true}}}"#;
        assert!(Config::from_reader(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_validate_enabled_service() {
        let mut config = Config::from_reader(SAMPLE.as_bytes()).unwrap();
        config.service.get_mut("api").unwrap().check_interval = 0;
        assert!(config.validate().unwrap_err().contains("api"));

        let mut config = Config::from_reader(SAMPLE.as_bytes()).unwrap();
        config.service.get_mut("cache").unwrap().url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_channels() {
        let mut config = Config::from_reader(SAMPLE.as_bytes()).unwrap();
        config.notificator.discord.as_mut().unwrap().webhook_url.clear();
        assert!(config.validate().is_err());

        let mut config = Config::from_reader(SAMPLE.as_bytes()).unwrap();
        config.notificator.email = Some(EmailConfig {
            enable: true,
            host: "smtp.example.com".to_string(),
            from: "watchdog@example.com".to_string(),
            ..Default::default()
        });
        assert!(config.validate().unwrap_err().contains("recipient"));

        config.notificator.email.as_mut().unwrap().enable = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.service["api"].url, "http://localhost:8080/health");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(dir.path().join("nope.json"));
        assert!(matches!(result, Err(crate::errors::WatchdogError::Io(_))));
    }
}
