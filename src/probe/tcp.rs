//! Raw TCP line-protocol probe

use super::{Probe, ProbeOutcome};
use crate::errors::{Result, WatchdogError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Keeps one connection open and sends a ping line on every check.
///
/// A failed dial, write or read marks the connection stale; the next
/// `ping` drops it and dials once more before reporting. Reconnect and
/// exchange share a single timeout.
pub struct TcpProbe {
    label: &'static str,
    target: String,
    timeout: Duration,
    verbose: bool,
    request: &'static [u8],
    expected_prefix: Option<&'static str>,
    /// Read reply lines up to a blank line or EOF instead of just one
    drain_reply: bool,
    conn: Option<BufReader<TcpStream>>,
    stale: bool,
}

impl TcpProbe {
    pub fn new(target: String, timeout: Duration, verbose: bool) -> Self {
        Self {
            label: "tcp",
            target,
            timeout,
            verbose,
            request: b"PING\n",
            expected_prefix: None,
            drain_reply: true,
            conn: None,
            stale: false,
        }
    }

    /// Swap the ping exchange, for line protocols with a known one-line reply
    pub(crate) fn with_exchange(
        mut self,
        label: &'static str,
        request: &'static [u8],
        expected_prefix: &'static str,
    ) -> Self {
        self.label = label;
        self.request = request;
        self.expected_prefix = Some(expected_prefix);
        self.drain_reply = false;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some() && !self.stale
    }

    async fn drop_connection(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.get_mut().shutdown().await;
        }
    }

    /// Bytes already buffered before a request belong to an earlier reply
    fn has_leftover(&self) -> bool {
        self.conn.as_ref().is_some_and(|conn| !conn.buffer().is_empty())
    }

    async fn reconnect_and_exchange(&mut self) -> ProbeOutcome {
        if self.stale || self.conn.is_none() || self.has_leftover() {
            self.drop_connection().await;
            if let Err(e) = self.dial().await {
                return ProbeOutcome::unhealthy(e.to_string());
            }
        }

        self.exchange().await
    }

    async fn exchange(&mut self) -> ProbeOutcome {
        let Some(conn) = self.conn.as_mut() else {
            return ProbeOutcome::unhealthy(format!("not connected to {}", self.target));
        };

        if let Err(e) = conn.get_mut().write_all(self.request).await {
            self.stale = true;
            return ProbeOutcome::unhealthy(format!("cannot write ping packet: {}", e));
        }

        let mut line = String::new();
        match conn.read_line(&mut line).await {
            Ok(0) => {
                self.stale = true;
                return ProbeOutcome::unhealthy("connection closed by peer");
            }
            Ok(_) => {}
            Err(e) => {
                self.stale = true;
                return ProbeOutcome::unhealthy(format!("read failed: {}", e));
            }
        }

        if let Some(prefix) = self.expected_prefix {
            if !line.starts_with(prefix) {
                return ProbeOutcome::unhealthy(format!("unexpected reply {:?}", line.trim_end()));
            }
        }

        if !self.drain_reply {
            return ProbeOutcome::Healthy;
        }

        while !line.trim_end().is_empty() {
            line.clear();
            match conn.read_line(&mut line).await {
                Ok(0) => {
                    // reply ended with the connection
                    self.stale = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    self.stale = true;
                    return ProbeOutcome::unhealthy(format!("read failed: {}", e));
                }
            }
        }

        ProbeOutcome::Healthy
    }

    async fn dial(&mut self) -> Result<()> {
        if self.verbose {
            debug!("connecting to {} server {}", self.label, self.target);
        }

        match TcpStream::connect(&self.target).await {
            Ok(stream) => {
                if self.verbose {
                    debug!("connecting to {} server {} succeed", self.label, self.target);
                }
                self.conn = Some(BufReader::new(stream));
                self.stale = false;
                Ok(())
            }
            Err(e) => {
                self.stale = true;
                Err(WatchdogError::Probe(format!(
                    "cannot connect to {} server {}: {}",
                    self.label, self.target, e
                )))
            }
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn ping(&mut self) -> ProbeOutcome {
        let result = timeout(self.timeout, self.reconnect_and_exchange()).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => {
                // a late reply would desync the next exchange
                self.stale = true;
                ProbeOutcome::unhealthy(format!("no reply from {} within {:?}", self.target, self.timeout))
            }
        };

        if self.verbose {
            debug!("{} ping {}: {}", self.label, self.target, outcome);
        }
        outcome
    }

    async fn connect(&mut self) -> Result<()> {
        match timeout(self.timeout, self.dial()).await {
            Ok(result) => result,
            Err(_) => {
                self.stale = true;
                Err(WatchdogError::Probe(format!(
                    "connecting to {} server {} timed out",
                    self.label, self.target
                )))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.verbose {
            debug!("close {} {}", self.label, self.target);
        }

        self.stale = false;
        if let Some(mut conn) = self.conn.take() {
            conn.get_mut().shutdown().await?;
        }
        Ok(())
    }
}
