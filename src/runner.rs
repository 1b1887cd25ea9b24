//! Scheduler running one check loop per enabled service

use crate::config::ServiceConfig;
use crate::errors::{Result, WatchdogError};
use crate::notify::{fan_out, Alert, AlertDirection, FanOutReport, Notifier};
use crate::probe::{DummyProbe, Probe, ProbeFactory, ProbeOutcome};
use crate::service::Service;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Source of the timestamps stamped on transitions
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A service record together with the probe that checks it.
/// Owned by a single check loop for the lifetime of the runner.
pub struct MonitoredService {
    pub service: Service,
    probe: Box<dyn Probe>,
    clock: Clock,
}

impl MonitoredService {
    pub fn new(service: Service, probe: Box<dyn Probe>) -> Self {
        Self {
            service,
            probe,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Probe once, apply the transition table and notify on an edge.
    ///
    /// Fan-out completes before this returns, so a service's own alerts
    /// are never reordered.
    pub async fn check(&mut self, notifiers: &[Arc<dyn Notifier>]) -> Option<FanOutReport> {
        let outcome = self.probe.ping().await;
        let now = (self.clock)();

        if let ProbeOutcome::Unhealthy(reason) = &outcome {
            debug!("{} probe failed: {}", self.service.name, reason);
        }

        let transition = self.service.state.observe(outcome.is_healthy(), now)?;
        let alert = Alert::from_transition(&self.service, &transition, now);

        match alert.direction {
            AlertDirection::Down => warn!("{}", alert.message()),
            AlertDirection::Up => info!("{}", alert.message()),
        }

        Some(fan_out(&alert, notifiers).await)
    }

    async fn connect(&mut self) -> Result<()> {
        self.probe.connect().await
    }

    /// Release the probe; failures are logged and swallowed
    async fn close(&mut self) {
        if let Err(e) = self.probe.close().await {
            warn!("Failed to close {} probe for {}: {}", self.probe.name(), self.service.name, e);
        }
    }
}

/// One-shot request to stop a running [`Runner`].
///
/// Consumed on use, so a runner can be asked to stop at most once.
#[derive(Debug)]
pub struct StopHandle {
    tx: oneshot::Sender<()>,
}

impl StopHandle {
    /// Returns false when the runner is already gone
    pub fn stop(self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Owns every monitored service and the notification channels
pub struct Runner {
    services: Vec<MonitoredService>,
    notifiers: Arc<[Arc<dyn Notifier>]>,
    stop_tx: Option<oneshot::Sender<()>>,
    stop_rx: oneshot::Receiver<()>,
}

impl Runner {
    /// Create a runner from configured services, building a probe for each.
    ///
    /// Disabled entries are never checked, so their url is not parsed and
    /// they get an inert probe.
    pub fn new(
        services: &BTreeMap<String, ServiceConfig>,
        notifiers: Vec<Arc<dyn Notifier>>,
        probe_timeout: Duration,
        verbose: bool,
    ) -> Result<Self> {
        let mut monitored = Vec::with_capacity(services.len());

        for (name, config) in services {
            let service = Service::from_config(name, config)?;
            let probe: Box<dyn Probe> = if service.enabled {
                ProbeFactory::create(service.kind, &service.url, probe_timeout, verbose)
                    .map_err(|e| WatchdogError::Probe(format!("service {}: {}", name, e)))?
            } else {
                Box::new(DummyProbe::new(verbose))
            };
            monitored.push(MonitoredService::new(service, probe));
        }

        Self::with_services(monitored, notifiers)
    }

    /// Create a runner from already paired services and probes
    pub fn with_services(
        services: Vec<MonitoredService>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Result<Self> {
        for monitored in &services {
            monitored.service.validate()?;
        }

        let (stop_tx, stop_rx) = oneshot::channel();

        Ok(Self {
            services,
            notifiers: notifiers.into(),
            stop_tx: Some(stop_tx),
            stop_rx,
        })
    }

    /// Hand out the stop request channel. Only the first call gets one.
    pub fn stop_handle(&mut self) -> Option<StopHandle> {
        self.stop_tx.take().map(|tx| StopHandle { tx })
    }

    /// Connect every configured probe ahead of the first check.
    ///
    /// Failures are only reported: the check loop retries through the
    /// probe's own reconnect on its next ping. Returns the failure count.
    pub async fn init_services(&mut self) -> usize {
        let mut failures = 0;

        for monitored in &mut self.services {
            match monitored.connect().await {
                Ok(()) => debug!("Connected {} probe for {}", monitored.probe.name(), monitored.service.name),
                Err(e) => {
                    failures += 1;
                    warn!("Initial connect for {} failed: {}", monitored.service.name, e);
                }
            }
        }

        failures
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.services.iter().filter(|m| m.service.enabled).count()
    }

    /// Run until `cancel` fires or a stop is requested.
    ///
    /// Returns only after every check loop has exited and every probe,
    /// including those of disabled services, has been closed.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let shutdown = cancel.child_token();
        let mut handles = Vec::new();
        let mut idle = Vec::new();

        for monitored in self.services {
            if monitored.service.enabled {
                let notifiers = Arc::clone(&self.notifiers);
                let token = shutdown.clone();
                handles.push(tokio::spawn(check_loop(monitored, notifiers, token)));
            } else {
                idle.push(monitored);
            }
        }

        info!(
            "Runner started: {} check loops, {} disabled services, {} notification channels",
            handles.len(),
            idle.len(),
            self.notifiers.len()
        );

        let reason = wait_for_shutdown(&cancel, self.stop_rx).await;
        info!("Shutting down runner on {}", reason);
        shutdown.cancel();

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Check loop terminated abnormally: {}", e);
            }
        }

        for monitored in &mut idle {
            monitored.close().await;
        }

        info!("Runner shutdown complete");
        Ok(())
    }
}

async fn wait_for_shutdown(
    cancel: &CancellationToken,
    stop_rx: oneshot::Receiver<()>,
) -> &'static str {
    tokio::select! {
        _ = cancel.cancelled() => "cancellation",
        request = stop_rx => match request {
            Ok(()) => "stop request",
            // handle dropped unused: only cancellation is left
            Err(_) => {
                cancel.cancelled().await;
                "cancellation"
            }
        },
    }
}

/// Periodic check loop for one service.
///
/// Shutdown is only observed between checks, never in the middle of a probe.
#[instrument(skip_all, fields(service = %monitored.service.name))]
async fn check_loop(
    mut monitored: MonitoredService,
    notifiers: Arc<[Arc<dyn Notifier>]>,
    shutdown: CancellationToken,
) {
    let period = monitored.service.check_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Monitoring {} ({}) every {}s",
        monitored.service.url,
        monitored.service.kind,
        period.as_secs()
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(report) = monitored.check(&notifiers).await {
                    debug!(
                        "Alert fan-out: {} delivered, {} failed",
                        report.delivered, report.failed
                    );
                }
            }
        }
    }

    monitored.close().await;
    debug!("Check loop stopped");
}
