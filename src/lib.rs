//! Carbon-intensity ingestion pipeline
//!
//! Polls a carbon-intensity data source zone by zone and forwards each
//! reading to a pluggable publisher (console or Kafka). The data source,
//! the polling reader and the publisher are chosen by name from the
//! application configuration.

pub mod config;
pub mod data_source;
pub mod error;
pub mod orchestrator;
pub mod publisher;
pub mod reader;
pub mod shutdown;
pub mod telemetry;
pub mod wire;

pub use crate::error::{Error, Result};
