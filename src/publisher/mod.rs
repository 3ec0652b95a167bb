//! Downstream sinks for carbon-intensity readings
//!
//! The orchestrator's dispatch loop is the only caller of a publisher, so
//! implementations need no internal synchronization.

pub mod console;
pub mod kafka;

pub use console::ConsolePublisher;
pub use kafka::KafkaPublisher;

use crate::error::Result;
use async_trait::async_trait;

/// Sink that emits `(key, payload)` pairs
#[async_trait]
pub trait Publisher: Send {
    /// Registry key of this variant
    fn name(&self) -> &'static str;

    /// Open the connection or session used by the sink
    async fn initialise(&mut self) -> Result<()>;

    /// Emit one message.
    ///
    /// Returns [`crate::Error::PublishError`] when only this message was lost
    /// and [`crate::Error::ConnectionError`] when the sink is unusable.
    async fn publish(&mut self, key: &str, payload: &str) -> Result<()>;

    /// Flush and release the sink. Called once after dispatch ends.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
