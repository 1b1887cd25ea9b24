//! Reachability probe for database backends

use super::{Probe, ProbeOutcome};
use crate::errors::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Opens a fresh connection per check and hangs up straight away.
/// Holds no resources between checks.
pub struct DialProbe {
    label: &'static str,
    target: String,
    timeout: Duration,
    verbose: bool,
}

impl DialProbe {
    pub fn new(label: &'static str, target: String, timeout: Duration, verbose: bool) -> Self {
        Self {
            label,
            target,
            timeout,
            verbose,
        }
    }
}

#[async_trait]
impl Probe for DialProbe {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn ping(&mut self) -> ProbeOutcome {
        let outcome = match timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(mut stream)) => {
                let _ = stream.shutdown().await;
                ProbeOutcome::Healthy
            }
            Ok(Err(e)) => ProbeOutcome::unhealthy(format!("cannot reach {}: {}", self.target, e)),
            Err(_) => ProbeOutcome::unhealthy(format!("dialing {} timed out", self.target)),
        };

        if self.verbose {
            debug!("{} ping {}: {}", self.label, self.target, outcome);
        }
        outcome
    }

    async fn connect(&mut self) -> Result<()> {
        if self.verbose {
            debug!("connect {} {}", self.label, self.target);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.verbose {
            debug!("close {} {}", self.label, self.target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_port_is_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut probe = DialProbe::new("postgresql", addr, Duration::from_secs(2), true);
        assert!(probe.connect().await.is_ok());
        assert_eq!(probe.ping().await, ProbeOutcome::Healthy);
        assert!(probe.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_port_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut probe = DialProbe::new("mysql", addr, Duration::from_secs(2), false);
        assert!(!probe.ping().await.is_healthy());
    }
}
