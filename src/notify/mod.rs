//! Alert events and delivery to notification channels

pub mod discord;
pub mod email;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;

use crate::config::NotificatorConfig;
use crate::errors::Result;
use crate::service::{Service, ServiceKind, Transition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertDirection {
    Down,
    Up,
}

impl std::fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertDirection::Down => write!(f, "DOWN"),
            AlertDirection::Up => write!(f, "UP"),
        }
    }
}

/// Payload built on every transition and handed to each channel
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub service_name: String,
    pub kind: ServiceKind,
    pub url: String,
    pub direction: AlertDirection,
    /// Start of the outage an `Up` alert closes
    pub down_since: Option<DateTime<Utc>>,
    /// Set on `Up` alerts only
    pub downtime_minutes: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn down(service: &Service, at: DateTime<Utc>) -> Self {
        Self::build(service, AlertDirection::Down, None, at)
    }

    pub fn up(
        service: &Service,
        down_since: DateTime<Utc>,
        downtime_minutes: i64,
        at: DateTime<Utc>,
    ) -> Self {
        let mut alert = Self::build(service, AlertDirection::Up, Some(downtime_minutes), at);
        alert.down_since = Some(down_since);
        alert
    }

    pub fn from_transition(service: &Service, transition: &Transition, now: DateTime<Utc>) -> Self {
        match transition {
            Transition::WentDown { at } => Self::down(service, *at),
            Transition::Recovered {
                down_since,
                downtime_minutes,
            } => Self::up(service, *down_since, *downtime_minutes, now),
        }
    }

    fn build(
        service: &Service,
        direction: AlertDirection,
        downtime_minutes: Option<i64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_name: service.name.clone(),
            kind: service.kind,
            url: service.url.clone(),
            direction,
            down_since: None,
            downtime_minutes,
            timestamp,
        }
    }

    /// Human readable text shared by all channels
    pub fn message(&self) -> String {
        let head = format!(
            "{} ({}) {} is {}",
            self.service_name, self.kind, self.url, self.direction
        );

        match (self.direction, self.downtime_minutes) {
            (AlertDirection::Up, Some(minutes)) => {
                format!("{}, it was down for {} minutes", head, minutes)
            }
            _ => head,
        }
    }
}

/// A delivery mechanism for alerts.
///
/// One instance is shared by every check loop, so implementations must be
/// safe for concurrent use.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Outcome counts of one fan-out
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver `alert` to every channel.
///
/// Channels are attempted concurrently and independently; a failing channel
/// is logged and counted but never stops the others.
pub async fn fan_out(alert: &Alert, notifiers: &[Arc<dyn Notifier>]) -> FanOutReport {
    let deliveries = notifiers.iter().map(|notifier| async move {
        let result = notifier.send(alert).await;
        (notifier.name().to_string(), result)
    });

    let mut report = FanOutReport::default();
    for (channel, result) in join_all(deliveries).await {
        match result {
            Ok(()) => {
                debug!("Alert {} delivered via {}", alert.id, channel);
                report.delivered += 1;
            }
            Err(e) => {
                warn!(
                    "Failed to deliver alert {} for {} via {}: {}",
                    alert.id, alert.service_name, channel, e
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// Build every enabled channel from configuration
pub fn build_notifiers(config: &NotificatorConfig) -> Result<Vec<Arc<dyn Notifier>>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if let Some(email) = config.email.as_ref().filter(|e| e.enable) {
        notifiers.push(Arc::new(EmailNotifier::new(email)?));
    }

    if let Some(discord) = config.discord.as_ref().filter(|d| d.enable) {
        notifiers.push(Arc::new(DiscordNotifier::new(discord)?));
    }

    Ok(notifiers)
}
