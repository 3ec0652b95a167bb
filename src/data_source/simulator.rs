//! Simulated data source for demonstrations without a live provider

use crate::data_source::types::{DataSourceDetails, IntensityRecord};
use crate::data_source::DataSource;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

/// (zone, base intensity gCO2eq/kWh, fossil fuel percentage)
const SIMULATED_ZONES: &[(&str, f64, f64)] = &[
    ("US-CA", 150.0, 55.0),  // California - moderate
    ("US-WA", 80.0, 35.0),   // Washington - low (hydro)
    ("DE", 300.0, 75.0),     // Germany - high
    ("FR", 60.0, 30.0),      // France - very low (nuclear)
    ("GB", 200.0, 65.0),     // Great Britain - moderate
    ("NO", 30.0, 5.0),       // Norway - very low (hydro)
    ("SE", 50.0, 20.0),      // Sweden - very low (hydro/nuclear)
    ("AU-NSW", 600.0, 85.0), // Australia NSW - high (coal)
];

/// Maximum relative jitter applied to the base intensity
const JITTER: f64 = 0.05;

#[derive(Debug, Default)]
pub struct Simulator;

impl Simulator {
    pub fn new() -> Self {
        Self
    }

    fn simulate(zone: &str, base: f64, fossil: f64) -> IntensityRecord {
        let factor = 1.0 + rand::thread_rng().gen_range(-JITTER..=JITTER);
        IntensityRecord {
            key: zone.to_string(),
            country_code: zone.to_string(),
            country_name: String::new(),
            zone_name: String::new(),
            status: "simulated".to_string(),
            datetime: Utc::now().to_rfc3339(),
            carbon_intensity: (base * factor * 100.0).round() / 100.0,
            fossil_fuel_percentage: fossil,
            unit_name: "carbonIntensity".to_string(),
            unit_value: "gCO2eq/kWh".to_string(),
        }
    }
}

#[async_trait]
impl DataSource for Simulator {
    fn name(&self) -> &'static str {
        "simulator"
    }

    async fn initialise(&mut self) -> Result<()> {
        info!(zones = SIMULATED_ZONES.len(), "Simulator initialised");
        Ok(())
    }

    async fn available_zones(&self) -> Result<Vec<String>> {
        Ok(SIMULATED_ZONES.iter().map(|(z, _, _)| z.to_string()).collect())
    }

    async fn readings(&self, zone: &str) -> Result<Vec<DataSourceDetails>> {
        let Some((zone, base, fossil)) = SIMULATED_ZONES.iter().find(|(z, _, _)| *z == zone) else {
            debug!(zone, "No simulated data for zone");
            return Ok(Vec::new());
        };
        let record = Self::simulate(zone, *base, *fossil);
        Ok(vec![record.into_details()?])
    }
}
