//! Readers drive the polling cadence.
//!
//! A reader asks its data source for each zone in turn and forwards every
//! valid reading on the outbound channel. It stops early when the shared
//! cancellation token fires and always finishes with [`ReaderMessage::Done`].
//!
//! Call order: [`Reader::initialise`], then [`Reader::set_data_source`], then
//! [`Reader::run`]. Out-of-order calls return [`Error::ReaderError`].

pub mod one_shot;
pub mod timer;

pub use one_shot::OneShotReader;
pub use timer::TimerReader;

use crate::config::{SweepConfig, ZoneFailurePolicy};
use crate::data_source::{DataSource, DataSourceDetails};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Message carried on the outbound channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderMessage {
    Reading(DataSourceDetails),
    /// The reader has finished; no further messages follow
    Done,
}

/// Polling strategy
#[async_trait]
pub trait Reader: Send {
    /// Registry key of this variant
    fn name(&self) -> &'static str;

    /// Bind the outbound channel and the cancellation token
    fn initialise(&mut self, outbound: mpsc::Sender<ReaderMessage>, cancel: CancellationToken);

    /// Bind the data source; requires a prior `initialise`
    fn set_data_source(&mut self, data_source: Arc<dyn DataSource>) -> Result<()>;

    /// Sweep `zones` until finished or cancelled
    async fn run(&mut self, zones: Vec<String>) -> Result<()>;
}

/// Sweep timing and failure handling
#[derive(Clone, Debug)]
pub struct SweepSettings {
    pub rate_limit: Duration,
    pub fetch_timeout: Duration,
    pub zone_failure: ZoneFailurePolicy,
}

impl From<&SweepConfig> for SweepSettings {
    fn from(config: &SweepConfig) -> Self {
        Self {
            rate_limit: config.rate_limit(),
            fetch_timeout: config.fetch_timeout(),
            zone_failure: config.zone_failure,
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self::from(&SweepConfig::default())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SweepOutcome {
    Completed { forwarded: usize },
    Cancelled,
}

/// Channels and data source shared by every reader variant
#[derive(Default)]
pub(crate) struct ReaderBinding {
    outbound: Option<mpsc::Sender<ReaderMessage>>,
    cancel: Option<CancellationToken>,
    data_source: Option<Arc<dyn DataSource>>,
}

/// Everything `run` needs, borrowed from a fully bound reader
pub(crate) struct BoundReader<'a> {
    pub outbound: &'a mpsc::Sender<ReaderMessage>,
    pub cancel: &'a CancellationToken,
    pub data_source: &'a dyn DataSource,
}

impl ReaderBinding {
    pub fn initialise(&mut self, outbound: mpsc::Sender<ReaderMessage>, cancel: CancellationToken) {
        self.outbound = Some(outbound);
        self.cancel = Some(cancel);
    }

    pub fn set_data_source(&mut self, reader: &str, data_source: Arc<dyn DataSource>) -> Result<()> {
        if self.outbound.is_none() {
            return Err(Error::ReaderError(format!(
                "{reader}: set_data_source called before initialise"
            )));
        }
        self.data_source = Some(data_source);
        Ok(())
    }

    pub fn bound(&self, reader: &str) -> Result<BoundReader<'_>> {
        match (&self.outbound, &self.cancel, &self.data_source) {
            (Some(outbound), Some(cancel), Some(data_source)) => Ok(BoundReader {
                outbound,
                cancel,
                data_source: data_source.as_ref(),
            }),
            (None, _, _) | (_, None, _) => Err(Error::ReaderError(format!(
                "{reader}: run called before initialise"
            ))),
            (_, _, None) => Err(Error::ReaderError(format!(
                "{reader}: run called without a data source"
            ))),
        }
    }
}

impl BoundReader<'_> {
    /// One pass over `zones`.
    ///
    /// Cancellation is observed while fetching, while sending and during the
    /// rate-limit delay between zones.
    pub async fn sweep(&self, zones: &[String], settings: &SweepSettings) -> Result<SweepOutcome> {
        let mut forwarded = 0;

        for (index, zone) in zones.iter().enumerate() {
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(SweepOutcome::Cancelled),
                res = tokio::time::timeout(settings.fetch_timeout, self.data_source.readings(zone)) => res,
            };

            let readings = match fetched {
                Ok(Ok(readings)) => readings,
                Ok(Err(e)) => self.zone_failed(zone, e.to_string(), settings)?,
                Err(_) => self.zone_failed(
                    zone,
                    format!("no response within {:?}", settings.fetch_timeout),
                    settings,
                )?,
            };

            for reading in readings {
                if !reading.is_valid() {
                    debug!(zone, "Dropping reading without a key");
                    continue;
                }
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(SweepOutcome::Cancelled),
                    sent = self.outbound.send(ReaderMessage::Reading(reading)) => {
                        if sent.is_err() {
                            return Err(Error::ReaderError("outbound channel closed".to_string()));
                        }
                        forwarded += 1;
                    }
                }
            }

            if index + 1 < zones.len() && !settings.rate_limit.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(SweepOutcome::Cancelled),
                    _ = tokio::time::sleep(settings.rate_limit) => {}
                }
            }
        }

        Ok(SweepOutcome::Completed { forwarded })
    }

    fn zone_failed(
        &self,
        zone: &str,
        message: String,
        settings: &SweepSettings,
    ) -> Result<Vec<DataSourceDetails>> {
        match settings.zone_failure {
            ZoneFailurePolicy::Skip => {
                warn!(zone, error = %message, "Skipping zone after fetch failure");
                Ok(Vec::new())
            }
            ZoneFailurePolicy::Abort => Err(Error::ProviderError {
                zone: zone.to_string(),
                message,
            }),
        }
    }

    /// Send the final sentinel. A closed channel means nobody is listening.
    pub async fn finish(&self) {
        if self.outbound.send(ReaderMessage::Done).await.is_err() {
            debug!("Outbound channel closed before the done sentinel");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Data source answering from a fixed table, recording every request
    #[derive(Default)]
    pub struct TableSource {
        pub table: HashMap<String, Result<Vec<DataSourceDetails>, String>>,
        /// Zones in insertion order, served by `available_zones`
        pub order: Vec<String>,
        pub requested: Mutex<Vec<String>>,
    }

    impl TableSource {
        pub fn with(self, zone: &str, readings: &[(&str, &str)]) -> Self {
            let readings = readings
                .iter()
                .map(|(k, p)| DataSourceDetails::new(*k, *p))
                .collect();
            self.insert(zone, Ok(readings))
        }

        pub fn failing(self, zone: &str, message: &str) -> Self {
            self.insert(zone, Err(message.to_string()))
        }

        fn insert(mut self, zone: &str, entry: Result<Vec<DataSourceDetails>, String>) -> Self {
            if self.table.insert(zone.to_string(), entry).is_none() {
                self.order.push(zone.to_string());
            }
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataSource for TableSource {
        fn name(&self) -> &'static str {
            "table"
        }

        async fn initialise(&mut self) -> Result<()> {
            Ok(())
        }

        async fn available_zones(&self) -> Result<Vec<String>> {
            Ok(self.order.clone())
        }

        async fn readings(&self, zone: &str) -> Result<Vec<DataSourceDetails>> {
            self.requested.lock().unwrap().push(zone.to_string());
            match self.table.get(zone) {
                Some(Ok(readings)) => Ok(readings.clone()),
                Some(Err(message)) => Err(Error::NetworkError(message.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    pub fn fast_settings() -> SweepSettings {
        SweepSettings {
            rate_limit: Duration::ZERO,
            fetch_timeout: Duration::from_secs(5),
            zone_failure: ZoneFailurePolicy::Skip,
        }
    }

    pub fn zones(names: &[&str]) -> Vec<String> {
        names.iter().map(|z| z.to_string()).collect()
    }

    /// Receive until `Done` or channel closure
    pub async fn collect(rx: &mut mpsc::Receiver<ReaderMessage>) -> Vec<ReaderMessage> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv().await {
            let done = msg == ReaderMessage::Done;
            out.push(msg);
            if done {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn bound_parts() -> (
        mpsc::Sender<ReaderMessage>,
        mpsc::Receiver<ReaderMessage>,
        CancellationToken,
    ) {
        let (tx, rx) = mpsc::channel(16);
        (tx, rx, CancellationToken::new())
    }

    #[test]
    fn test_set_data_source_requires_initialise() {
        let mut binding = ReaderBinding::default();
        let err = binding
            .set_data_source("one-shot", Arc::new(TableSource::default()))
            .unwrap_err();
        assert!(err.to_string().contains("before initialise"));
    }

    #[test]
    fn test_run_requires_data_source() {
        let (tx, _rx, cancel) = bound_parts();
        let mut binding = ReaderBinding::default();
        binding.initialise(tx, cancel);
        let err = binding.bound("one-shot").err().unwrap();
        assert!(err.to_string().contains("without a data source"));
    }

    #[tokio::test]
    async fn test_sweep_skips_invalid_readings() {
        let (tx, mut rx, cancel) = bound_parts();
        let source = TableSource::default().with("X", &[("", "p0"), ("X", "p1")]);
        let bound = BoundReader {
            outbound: &tx,
            cancel: &cancel,
            data_source: &source,
        };

        let outcome = bound.sweep(&zones(&["X"]), &fast_settings()).await.unwrap();
        assert_eq!(outcome, SweepOutcome::Completed { forwarded: 1 });
        assert_eq!(
            rx.try_recv().unwrap(),
            ReaderMessage::Reading(DataSourceDetails::new("X", "p1"))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sweep_skip_policy_continues_after_failure() {
        let (tx, mut rx, cancel) = bound_parts();
        let source = TableSource::default()
            .failing("A", "connection reset")
            .with("B", &[("B", "pb")]);
        let bound = BoundReader {
            outbound: &tx,
            cancel: &cancel,
            data_source: &source,
        };

        let outcome = bound.sweep(&zones(&["A", "B"]), &fast_settings()).await.unwrap();
        assert_eq!(outcome, SweepOutcome::Completed { forwarded: 1 });
        assert_eq!(source.requested(), vec!["A", "B"]);
        assert_eq!(
            rx.try_recv().unwrap(),
            ReaderMessage::Reading(DataSourceDetails::new("B", "pb"))
        );
    }

    #[tokio::test]
    async fn test_sweep_abort_policy_stops_at_failure() {
        let (tx, _rx, cancel) = bound_parts();
        let source = TableSource::default()
            .failing("A", "connection reset")
            .with("B", &[("B", "pb")]);
        let bound = BoundReader {
            outbound: &tx,
            cancel: &cancel,
            data_source: &source,
        };
        let settings = SweepSettings {
            zone_failure: ZoneFailurePolicy::Abort,
            ..fast_settings()
        };

        let err = bound.sweep(&zones(&["A", "B"]), &settings).await.unwrap_err();
        assert!(matches!(err, Error::ProviderError { ref zone, .. } if zone == "A"));
        assert_eq!(source.requested(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_cancelled_sweep_fetches_nothing() {
        let (tx, _rx, cancel) = bound_parts();
        let source = TableSource::default().with("A", &[("A", "pa")]);
        cancel.cancel();
        let bound = BoundReader {
            outbound: &tx,
            cancel: &cancel,
            data_source: &source,
        };

        let outcome = bound.sweep(&zones(&["A"]), &fast_settings()).await.unwrap();
        assert_eq!(outcome, SweepOutcome::Cancelled);
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_rate_limit_delay() {
        let (tx, mut rx, cancel) = bound_parts();
        let source = TableSource::default()
            .with("A", &[("A", "pa")])
            .with("B", &[("B", "pb")]);
        let settings = SweepSettings {
            rate_limit: Duration::from_secs(3600),
            ..fast_settings()
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let bound = BoundReader {
            outbound: &tx,
            cancel: &cancel,
            data_source: &source,
        };
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            bound.sweep(&zones(&["A", "B"]), &settings),
        )
        .await
        .expect("sweep should stop on cancellation")
        .unwrap();

        assert_eq!(outcome, SweepOutcome::Cancelled);
        assert_eq!(source.requested(), vec!["A"]);
        assert_eq!(
            rx.try_recv().unwrap(),
            ReaderMessage::Reading(DataSourceDetails::new("A", "pa"))
        );
    }
}
