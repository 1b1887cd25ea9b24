//! Redis probe speaking inline RESP `PING`

use super::{Probe, ProbeOutcome, TcpProbe};
use crate::errors::Result;
use async_trait::async_trait;
use std::time::Duration;

pub struct RedisProbe {
    inner: TcpProbe,
}

impl RedisProbe {
    pub fn new(target: String, timeout: Duration, verbose: bool) -> Self {
        Self {
            inner: TcpProbe::new(target, timeout, verbose).with_exchange("redis", b"PING\r\n", "+PONG"),
        }
    }
}

#[async_trait]
impl Probe for RedisProbe {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&mut self) -> ProbeOutcome {
        self.inner.ping().await
    }

    async fn connect(&mut self) -> Result<()> {
        self.inner.connect().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
