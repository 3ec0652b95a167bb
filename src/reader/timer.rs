//! Reader that repeats the sweep on a fixed period
//!
//! The first sweep starts immediately. Sweeps run inline, so a sweep that
//! outlasts the period delays the next one instead of overlapping it; ticks
//! missed in the meantime are skipped rather than replayed in a burst.

use crate::data_source::DataSource;
use crate::error::Result;
use crate::reader::{Reader, ReaderBinding, ReaderMessage, SweepOutcome, SweepSettings};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct TimerReader {
    binding: ReaderBinding,
    settings: SweepSettings,
    period: Duration,
}

impl TimerReader {
    pub fn new(settings: SweepSettings, period: Duration) -> Self {
        Self {
            binding: ReaderBinding::default(),
            settings,
            period,
        }
    }
}

#[async_trait]
impl Reader for TimerReader {
    fn name(&self) -> &'static str {
        "time-reader"
    }

    fn initialise(&mut self, outbound: mpsc::Sender<ReaderMessage>, cancel: CancellationToken) {
        self.binding.initialise(outbound, cancel);
    }

    fn set_data_source(&mut self, data_source: Arc<dyn DataSource>) -> Result<()> {
        self.binding.set_data_source(self.name(), data_source)
    }

    async fn run(&mut self, zones: Vec<String>) -> Result<()> {
        let bound = self.binding.bound(self.name())?;
        info!(zones = zones.len(), period = ?self.period, "Timer reader started");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweeps: u64 = 0;

        let result = loop {
            tokio::select! {
                biased;
                _ = bound.cancel.cancelled() => break Ok(()),
                _ = ticker.tick() => {}
            }

            sweeps += 1;
            debug!(sweep = sweeps, "Starting sweep");
            match bound.sweep(&zones, &self.settings).await {
                Ok(SweepOutcome::Completed { forwarded }) => {
                    info!(sweep = sweeps, forwarded, "Sweep complete");
                }
                Ok(SweepOutcome::Cancelled) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        bound.finish().await;
        info!(sweeps, "Timer reader stopped");
        result
    }
}
