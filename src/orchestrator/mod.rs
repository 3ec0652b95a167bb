//! Orchestrator: wires data source, reader and publisher together.
//!
//! The reader runs as its own task and feeds a bounded channel. The dispatch
//! loop on the calling task is the channel's only consumer and the
//! publisher's only caller. On shutdown the loop cancels the reader, drains
//! the channel up to the done sentinel and joins the reader task before the
//! channel is released.

pub mod registry;

pub use registry::{data_sources, publishers, readers, Registry};

use crate::config::AppConfig;
use crate::data_source::{DataSource, DataSourceDetails};
use crate::error::{Error, Result};
use crate::publisher::Publisher;
use crate::reader::{Reader, ReaderMessage};
use crate::wire::{self, MalformedMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One reading in flight at a time
const OUTBOUND_CAPACITY: usize = 1;

/// Why the dispatch loop stopped
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopReason {
    /// The reader sent the done sentinel
    #[default]
    ReaderFinished,
    /// The reader task ended without a sentinel
    ReaderExited,
    /// A termination signal arrived
    Shutdown,
    /// The publisher lost its connection
    PublisherFailed,
}

/// Counters reported when the orchestrator stops
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub published: u64,
    /// Messages rejected before reaching the publisher
    pub discarded: u64,
    /// Recoverable delivery failures
    pub failed: u64,
    /// Readings drained and dropped during shutdown
    pub dropped_on_shutdown: u64,
    pub stop_reason: StopReason,
}

pub struct Orchestrator {
    data_source: Box<dyn DataSource>,
    reader: Box<dyn Reader>,
    publisher: Box<dyn Publisher>,
    shutdown_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        data_source: Box<dyn DataSource>,
        reader: Box<dyn Reader>,
        publisher: Box<dyn Publisher>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            data_source,
            reader,
            publisher,
            shutdown_timeout,
        }
    }

    /// Resolve the three configured variants from their registries
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let data_source = data_sources().resolve(&config.data_source, config)?;
        let reader = readers().resolve(&config.reader, config)?;
        let publisher = publishers().resolve(&config.data_publisher, config)?;

        info!(
            data_source = data_source.name(),
            reader = reader.name(),
            publisher = publisher.name(),
            dry_run = config.dry_run,
            "Resolved pipeline"
        );
        Ok(Self::new(
            data_source,
            reader,
            publisher,
            config.shutdown.timeout(),
        ))
    }

    /// Run the pipeline until the reader finishes or `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<DispatchSummary>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut data_source,
            mut reader,
            mut publisher,
            shutdown_timeout,
        } = self;

        data_source.initialise().await?;
        let data_source: Arc<dyn DataSource> = Arc::from(data_source);

        let (outbound, mut inbound) = mpsc::channel(OUTBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        reader.initialise(outbound, cancel.clone());
        reader.set_data_source(Arc::clone(&data_source))?;

        publisher.initialise().await?;

        let zones = match data_source.available_zones().await {
            Ok(zones) => zones,
            Err(e) => {
                if let Err(close_err) = publisher.close().await {
                    warn!(error = %close_err, "Publisher close failed");
                }
                return Err(e);
            }
        };
        info!(count = zones.len(), "Starting reader");
        let reader_name = reader.name();
        let reader_task: JoinHandle<Result<()>> =
            tokio::spawn(async move { reader.run(zones).await });

        let mut summary = DispatchSummary::default();
        let mut fatal: Option<Error> = None;
        tokio::pin!(shutdown);

        let stop_reason = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Caught termination signal, shutting down");
                    break StopReason::Shutdown;
                }
                message = inbound.recv() => match message {
                    Some(ReaderMessage::Done) => {
                        debug!("Reader sent done");
                        break StopReason::ReaderFinished;
                    }
                    None => {
                        warn!(reader = reader_name, "Reader exited without sending done");
                        break StopReason::ReaderExited;
                    }
                    Some(ReaderMessage::Reading(details)) => {
                        match dispatch(publisher.as_mut(), &details).await {
                            Dispatched::Published => summary.published += 1,
                            Dispatched::Discarded => summary.discarded += 1,
                            Dispatched::Failed => summary.failed += 1,
                            Dispatched::Fatal(e) => {
                                error!(error = %e, "Publisher failed, shutting down");
                                fatal = Some(e);
                                break StopReason::PublisherFailed;
                            }
                        }
                    }
                }
            }
        };
        summary.stop_reason = stop_reason;

        cancel.cancel();
        // Drain and join share a single bound
        let deadline = Instant::now() + shutdown_timeout;
        if matches!(
            summary.stop_reason,
            StopReason::Shutdown | StopReason::PublisherFailed
        ) {
            summary.dropped_on_shutdown = drain(&mut inbound, deadline).await;
        }
        let reader_result = join_reader(reader_task, deadline, shutdown_timeout).await;

        if let Err(e) = publisher.close().await {
            warn!(error = %e, "Publisher close failed");
        }
        drop(inbound);

        info!(
            published = summary.published,
            discarded = summary.discarded,
            failed = summary.failed,
            dropped = summary.dropped_on_shutdown,
            reason = ?summary.stop_reason,
            "Exiting"
        );

        if let Some(e) = fatal {
            return Err(e);
        }
        reader_result?;
        Ok(summary)
    }
}

enum Dispatched {
    Published,
    Discarded,
    Failed,
    Fatal(Error),
}

/// Forward one reading, keeping the loop alive on per-message failures
async fn dispatch(publisher: &mut dyn Publisher, details: &DataSourceDetails) -> Dispatched {
    if !details.is_valid() {
        let malformed = MalformedMessage(wire::encode(&details.zone_key, &details.payload));
        warn!(error = %malformed, "Discarding reading");
        return Dispatched::Discarded;
    }

    match publisher.publish(&details.zone_key, &details.payload).await {
        Ok(()) => {
            debug!(key = %details.zone_key, "Published reading");
            Dispatched::Published
        }
        Err(e) if e.is_recoverable() => {
            warn!(key = %details.zone_key, error = %e, "Publish failed, continuing");
            Dispatched::Failed
        }
        Err(e) => Dispatched::Fatal(e),
    }
}

/// Consume until the done sentinel or closure so the reader is never left
/// blocked on a send. Returns the number of readings dropped.
async fn drain(inbound: &mut mpsc::Receiver<ReaderMessage>, deadline: Instant) -> u64 {
    let mut dropped = 0;
    let drained = tokio::time::timeout_at(deadline, async {
        while let Some(message) = inbound.recv().await {
            match message {
                ReaderMessage::Done => break,
                ReaderMessage::Reading(_) => dropped += 1,
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!("Reader did not acknowledge cancellation in time");
    }
    dropped
}

/// Wait for the reader task until `deadline`, then abort it. Returns only
/// once the task has exited, so the channel can be released safely.
async fn join_reader(
    mut task: JoinHandle<Result<()>>,
    deadline: Instant,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(Error::ReaderError(format!(
            "reader task failed: {join_error}"
        ))),
        Err(_) => {
            warn!(?timeout, "Reader task did not stop in time, aborting it");
            task.abort();
            let _ = task.await;
            Err(Error::ReaderError(format!(
                "reader did not stop within {timeout:?}"
            )))
        }
    }
}
