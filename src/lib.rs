//! Service Health Watchdog Library
//!
//! Periodically probes TCP, HTTP and database endpoints, tracks each one's
//! up/down state and sends alerts to every notification channel when a
//! service goes down or recovers.

pub mod config;
pub mod errors;
pub mod notify;
pub mod probe;
pub mod runner;
pub mod service;

pub use config::Config;
pub use errors::{Result, WatchdogError};
pub use notify::{fan_out, Alert, AlertDirection, Notifier};
pub use probe::{Probe, ProbeFactory, ProbeOutcome};
pub use runner::{Runner, StopHandle};
pub use service::{Service, ServiceKind, ServiceState, Transition};
