//! Reader that sweeps the zone list once and finishes

use crate::data_source::DataSource;
use crate::error::Result;
use crate::reader::{Reader, ReaderBinding, ReaderMessage, SweepOutcome, SweepSettings};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct OneShotReader {
    binding: ReaderBinding,
    settings: SweepSettings,
}

impl OneShotReader {
    pub fn new(settings: SweepSettings) -> Self {
        Self {
            binding: ReaderBinding::default(),
            settings,
        }
    }
}

#[async_trait]
impl Reader for OneShotReader {
    fn name(&self) -> &'static str {
        "one-shot"
    }

    fn initialise(&mut self, outbound: mpsc::Sender<ReaderMessage>, cancel: CancellationToken) {
        self.binding.initialise(outbound, cancel);
    }

    fn set_data_source(&mut self, data_source: Arc<dyn DataSource>) -> Result<()> {
        self.binding.set_data_source(self.name(), data_source)
    }

    async fn run(&mut self, zones: Vec<String>) -> Result<()> {
        let bound = self.binding.bound(self.name())?;
        info!(zones = zones.len(), "One-shot reader started");

        let outcome = bound.sweep(&zones, &self.settings).await;
        bound.finish().await;

        match outcome? {
            SweepOutcome::Completed { forwarded } => {
                info!(forwarded, "One-shot reader finished");
            }
            SweepOutcome::Cancelled => info!("One-shot reader cancelled"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneFailurePolicy;
    use crate::data_source::DataSourceDetails;
    use crate::error::Error;
    use crate::reader::test_support::*;
    use std::time::Duration;

    fn reading(key: &str, payload: &str) -> ReaderMessage {
        ReaderMessage::Reading(DataSourceDetails::new(key, payload))
    }

    fn reader_with(
        source: Arc<TableSource>,
        settings: SweepSettings,
        capacity: usize,
    ) -> (OneShotReader, mpsc::Receiver<ReaderMessage>, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let mut reader = OneShotReader::new(settings);
        reader.initialise(tx, cancel.clone());
        reader.set_data_source(source).unwrap();
        (reader, rx, cancel)
    }

    #[tokio::test]
    async fn test_emits_readings_in_zone_order_then_done() {
        let source = Arc::new(
            TableSource::default()
                .with("X", &[("X", "p1"), ("X", "p2")])
                .with("Y", &[("Y", "p3")]),
        );
        let (mut reader, mut rx, _cancel) = reader_with(source, fast_settings(), 16);

        reader.run(zones(&["Y", "X"])).await.unwrap();

        assert_eq!(
            collect(&mut rx).await,
            vec![
                reading("Y", "p3"),
                reading("X", "p1"),
                reading("X", "p2"),
                ReaderMessage::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_zone_list_emits_only_done() {
        let (mut reader, mut rx, _cancel) =
            reader_with(Arc::new(TableSource::default()), fast_settings(), 4);

        reader.run(Vec::new()).await.unwrap();
        assert_eq!(collect(&mut rx).await, vec![ReaderMessage::Done]);
    }

    #[tokio::test]
    async fn test_run_without_data_source_is_reported() {
        let (tx, _rx) = mpsc::channel(4);
        let mut reader = OneShotReader::new(fast_settings());
        reader.initialise(tx, CancellationToken::new());

        let err = reader.run(zones(&["X"])).await.unwrap_err();
        assert!(matches!(err, Error::ReaderError(_)));
    }

    #[tokio::test]
    async fn test_cancel_mid_sweep_stops_forwarding() {
        let source = Arc::new(
            TableSource::default()
                .with("A", &[("A", "a1"), ("A", "a2"), ("A", "a3")])
                .with("B", &[("B", "b1")]),
        );
        // capacity 1: the second send blocks until the consumer reads
        let (mut reader, mut rx, cancel) = reader_with(source.clone(), fast_settings(), 1);
        let task = tokio::spawn(async move { reader.run(zones(&["A", "B"])).await });

        assert_eq!(rx.recv().await, Some(reading("A", "a1")));
        cancel.cancel();

        let rest = collect(&mut rx).await;
        assert_eq!(rest.last(), Some(&ReaderMessage::Done));
        assert!(rest
            .iter()
            .all(|m| !matches!(m, ReaderMessage::Reading(d) if d.zone_key == "B")));
        assert!(rest.len() <= 2, "at most one buffered reading before done");

        task.await.unwrap().unwrap();
        assert_eq!(source.requested(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_abort_policy_emits_done_and_returns_error() {
        let source = Arc::new(
            TableSource::default()
                .with("A", &[("A", "a1")])
                .failing("B", "timeout")
                .with("C", &[("C", "c1")]),
        );
        let settings = SweepSettings {
            zone_failure: ZoneFailurePolicy::Abort,
            ..fast_settings()
        };
        let (mut reader, mut rx, _cancel) = reader_with(source, settings, 16);

        let err = reader.run(zones(&["A", "B", "C"])).await.unwrap_err();
        assert!(matches!(err, Error::ProviderError { .. }));
        assert_eq!(
            collect(&mut rx).await,
            vec![reading("A", "a1"), ReaderMessage::Done]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_applies_between_zones() {
        let source = Arc::new(
            TableSource::default()
                .with("A", &[("A", "a")])
                .with("B", &[("B", "b")])
                .with("C", &[("C", "c")]),
        );
        let settings = SweepSettings {
            rate_limit: Duration::from_millis(40),
            ..fast_settings()
        };
        let (mut reader, _rx, _cancel) = reader_with(source, settings, 16);

        let started = std::time::Instant::now();
        reader.run(zones(&["A", "B", "C"])).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
