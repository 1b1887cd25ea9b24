//! Monitored service records and the up/down state machine

use crate::config::ServiceConfig;
use crate::errors::{Result, WatchdogError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of backend a service entry points at
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Tcp,
    Postgresql,
    Mysql,
    Web,
    Mongodb,
    Redis,
    Dummy,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Tcp => "tcp",
            ServiceKind::Postgresql => "postgresql",
            ServiceKind::Mysql => "mysql",
            ServiceKind::Web => "web",
            ServiceKind::Mongodb => "mongodb",
            ServiceKind::Redis => "redis",
            ServiceKind::Dummy => "dummy",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change detected between two consecutive probes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// UP -> DOWN
    WentDown { at: DateTime<Utc> },
    /// DOWN -> UP, carrying the whole outage length in truncated minutes
    Recovered {
        down_since: DateTime<Utc>,
        downtime_minutes: i64,
    },
}

/// Up/down state of a single service.
///
/// A fresh state is UP. `last_down_time` is written only on the UP -> DOWN
/// edge, so the downtime reported on recovery always spans the full outage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceState {
    recovered: bool,
    last_down_time: Option<DateTime<Utc>>,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceState {
    pub fn new() -> Self {
        Self {
            recovered: true,
            last_down_time: None,
        }
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn last_down_time(&self) -> Option<DateTime<Utc>> {
        self.last_down_time
    }

    /// Apply one probe result observed at `now`.
    ///
    /// Returns a transition only on an edge; steady UP and steady DOWN
    /// both yield `None`.
    pub fn observe(&mut self, healthy: bool, now: DateTime<Utc>) -> Option<Transition> {
        match (self.recovered, healthy) {
            (true, true) | (false, false) => None,
            (true, false) => {
                self.last_down_time = Some(now);
                self.recovered = false;
                Some(Transition::WentDown { at: now })
            }
            (false, true) => {
                self.recovered = true;
                let down_since = self.last_down_time.unwrap_or(now);
                Some(Transition::Recovered {
                    down_since,
                    downtime_minutes: downtime_minutes(down_since, now),
                })
            }
        }
    }
}

/// Whole minutes between `from` and `to`, fractional remainder dropped.
/// Clock skew that puts `to` before `from` reports zero.
pub fn downtime_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_minutes().max(0)
}

/// Per-target record owned by exactly one check loop
#[derive(Clone, Debug)]
pub struct Service {
    pub name: String,
    pub kind: ServiceKind,
    pub url: String,
    pub enabled: bool,
    pub check_interval: Duration,
    pub state: ServiceState,
}

impl Service {
    /// Build a service record from its configuration entry
    pub fn from_config(name: &str, config: &ServiceConfig) -> Result<Self> {
        let service = Self {
            name: name.to_string(),
            kind: config.kind,
            url: config.url.clone(),
            enabled: config.enable,
            check_interval: Duration::from_secs(config.check_interval),
            state: ServiceState::new(),
        };
        service.validate()?;
        Ok(service)
    }

    /// Enabled services need a positive interval and a target to probe.
    /// Disabled entries are never scheduled, so they are not checked.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.check_interval.is_zero() {
            return Err(WatchdogError::Config(format!(
                "service {} must have a check interval greater than 0",
                self.name
            )));
        }

        if self.url.trim().is_empty() {
            return Err(WatchdogError::Config(format!(
                "service {} must have a url",
                self.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_new_state_is_up() {
        let state = ServiceState::new();
        assert!(state.is_recovered());
        assert!(state.last_down_time().is_none());
    }

    #[test]
    fn test_steady_up_emits_nothing() {
        let mut state = ServiceState::new();
        for i in 0..5 {
            assert_eq!(state.observe(true, at(i)), None);
        }
        assert!(state.is_recovered());
    }

    #[test]
    fn test_outage_emits_single_down() {
        let mut state = ServiceState::new();

        assert_eq!(state.observe(false, at(0)), Some(Transition::WentDown { at: at(0) }));
        assert_eq!(state.observe(false, at(10)), None);
        assert_eq!(state.observe(false, at(20)), None);

        // repeated failures must not move the outage start
        assert_eq!(state.last_down_time(), Some(at(0)));
        assert!(!state.is_recovered());
    }

    #[test]
    fn test_recovery_reports_full_outage() {
        let mut state = ServiceState::new();
        state.observe(false, at(0));
        state.observe(false, at(60));

        let transition = state.observe(true, at(150));
        assert_eq!(
            transition,
            Some(Transition::Recovered {
                down_since: at(0),
                downtime_minutes: 2,
            })
        );
        assert!(state.is_recovered());
        assert_eq!(state.observe(true, at(160)), None);
    }

    #[test]
    fn test_downtime_truncates_to_minutes() {
        assert_eq!(downtime_minutes(at(0), at(90)), 1);
        assert_eq!(downtime_minutes(at(0), at(120)), 2);
        assert_eq!(downtime_minutes(at(0), at(59)), 0);
        assert_eq!(downtime_minutes(at(30), at(0)), 0);
    }

    #[test]
    fn test_second_outage_restarts_clock() {
        let mut state = ServiceState::new();
        state.observe(false, at(0));
        state.observe(true, at(60));

        assert_eq!(state.observe(false, at(600)), Some(Transition::WentDown { at: at(600) }));
        match state.observe(true, at(690)) {
            Some(Transition::Recovered { downtime_minutes, .. }) => assert_eq!(downtime_minutes, 1),
            other => panic!("unexpected transition: {:?}", other),
        }
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: ServiceKind = serde_json::from_str("\"postgresql\"").unwrap();
        assert_eq!(kind, ServiceKind::Postgresql);
        assert_eq!(ServiceKind::Mongodb.to_string(), "mongodb");
        assert!(serde_json::from_str::<ServiceKind>("\"oracle\"").is_err());
    }

    #[test]
    fn test_service_validation() {
        let mut config = ServiceConfig {
            kind: ServiceKind::Web,
            url: "http://localhost:8080".to_string(),
            check_interval: 5,
            enable: true,
        };
        assert!(Service::from_config("api", &config).is_ok());

        config.check_interval = 0;
        assert!(matches!(
            Service::from_config("api", &config),
            Err(WatchdogError::Config(_))
        ));

        config.enable = false;
        assert!(Service::from_config("api", &config).is_ok());

        config.enable = true;
        config.check_interval = 5;
        config.url = "  ".to_string();
        assert!(Service::from_config("api", &config).is_err());
    }
}
