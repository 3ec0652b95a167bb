//! Carbon-intensity data sources
//!
//! A data source knows which zones it can serve and fetches the latest
//! readings for one zone at a time. Readers call it sequentially, so
//! implementations never see concurrent `readings` calls from this crate.

pub mod co2_signal;
pub mod simulator;
pub mod types;

pub use co2_signal::Co2SignalDataSource;
pub use simulator::Simulator;
pub use types::{DataSourceDetails, IntensityRecord};

use crate::error::Result;
use async_trait::async_trait;

/// Provider of carbon-intensity readings
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Registry key of this variant
    fn name(&self) -> &'static str;

    /// One-time setup such as credential lookup. Must succeed before use.
    async fn initialise(&mut self) -> Result<()>;

    /// Zones this source can serve, possibly a degraded static list
    async fn available_zones(&self) -> Result<Vec<String>>;

    /// Latest readings for `zone`; empty when nothing usable was returned
    async fn readings(&self, zone: &str) -> Result<Vec<DataSourceDetails>>;
}
