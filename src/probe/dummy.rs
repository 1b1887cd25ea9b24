//! Probe that always reports healthy

use super::{Probe, ProbeOutcome};
use crate::errors::Result;
use async_trait::async_trait;
use tracing::debug;

pub struct DummyProbe {
    verbose: bool,
}

impl DummyProbe {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl Probe for DummyProbe {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn ping(&mut self) -> ProbeOutcome {
        if self.verbose {
            debug!("ping Dummy");
        }
        ProbeOutcome::Healthy
    }

    async fn connect(&mut self) -> Result<()> {
        if self.verbose {
            debug!("connect Dummy");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.verbose {
            debug!("close Dummy");
        }
        Ok(())
    }
}
