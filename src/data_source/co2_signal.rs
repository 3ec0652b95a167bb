//! CO2 Signal data source
//!
//! Fetches the latest carbon intensity per country code from the CO2 Signal
//! API and normalizes it into an [`IntensityRecord`].

use crate::config::Co2SignalConfig;
use crate::data_source::types::{DataSourceDetails, IntensityRecord};
use crate::data_source::DataSource;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Zones served when discovery is unavailable
pub const STATIC_ZONES: &[&str] = &[
    "US-AK",
    "US-CAL-BANC",
    "US-CAL-CISO",
    "US-CAL-IID",
    "US-CAL-LDWP",
    "US-CAR-CPLW",
    "US-CAR-DUK",
    "US-CAR-SC",
    "US-CAR-SCEG",
    "US-CAR-YAD",
    "US-CENT-SPA",
    "US-CENT-SWPP",
    "US-FLA-FMPP",
    "US-FLA-FPC",
    "US-FLA-FPL",
    "US-FLA-GVL",
    "US-FLA-SEC",
    "US-FLA-TAL",
    "US-FLA-TEC",
    "US-MIDA-PJM",
    "US-MIDW-AECI",
    "US-MIDW-GLHB",
    "US-MIDW-LGEE",
    "US-MIDW-MISO",
    "US-NE-ISNE",
    "US-NW-AVA",
    "US-NW-GCPD",
    "US-NW-GRID",
    "US-NW-GWA",
    "US-NW-IPCO",
];

/// CO2 Signal API client
pub struct Co2SignalDataSource {
    config: Co2SignalConfig,
    request_timeout: Duration,
    client: Option<Client>,
    auth_token: String,
}

impl Co2SignalDataSource {
    pub fn new(config: Co2SignalConfig, request_timeout: Duration) -> Self {
        Self {
            config,
            request_timeout,
            client: None,
            auth_token: String::new(),
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or_else(|| {
            Error::ConfigError("CO2 Signal data source used before initialise()".to_string())
        })
    }

    fn latest_url(&self) -> String {
        format!("{}/v1/latest", self.config.api_url.trim_end_matches('/'))
    }

    /// Fetch every zone key from the zones endpoint
    async fn discover_zones(&self) -> Result<Vec<String>> {
        let client = self.client()?;
        debug!(url = %self.config.zones_url, "Discovering zones");

        let response = client.get(&self.config.zones_url).send().await?;
        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "zone discovery returned {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;
        let zones = json
            .as_object()
            .ok_or_else(|| Error::ParseError("zone list is not a JSON object".to_string()))?;

        let mut keys: Vec<String> = zones.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl DataSource for Co2SignalDataSource {
    fn name(&self) -> &'static str {
        "co2-signal"
    }

    async fn initialise(&mut self) -> Result<()> {
        let env_name = &self.config.api_key_env;
        let token = std::env::var(env_name).unwrap_or_default();
        if token.trim().is_empty() {
            return Err(Error::ConfigError(format!(
                "API-key environment variable ({env_name}) not set"
            )));
        }

        self.auth_token = token;
        self.client = Some(Client::builder().timeout(self.request_timeout).build()?);
        info!(api_url = %self.config.api_url, "CO2 Signal data source initialised");
        Ok(())
    }

    async fn available_zones(&self) -> Result<Vec<String>> {
        if let Some(zones) = self.config.zones.as_ref().filter(|z| !z.is_empty()) {
            return Ok(zones.clone());
        }

        let zones = match self.discover_zones().await {
            Ok(zones) if !zones.is_empty() => zones,
            Ok(_) => {
                warn!("Zone discovery returned no zones, using the static zone list");
                static_zones()
            }
            Err(e) => {
                warn!(error = %e, "Zone discovery failed, using the static zone list");
                static_zones()
            }
        };
        info!(count = zones.len(), "Resolved available zones");
        Ok(zones)
    }

    async fn readings(&self, zone: &str) -> Result<Vec<DataSourceDetails>> {
        let client = self.client()?;
        debug!(zone, "Requesting carbon intensity");

        let response = client
            .get(self.latest_url())
            .query(&[("countryCode", zone)])
            .header("auth-token", &self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "CO2 Signal API error for {zone}: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        match parse_response(&body)? {
            Some(record) => {
                debug!(zone, key = %record.key, intensity = record.carbon_intensity, "Parsed reading");
                Ok(vec![record.into_details()?])
            }
            None => {
                warn!(zone, "Response did not contain a complete reading");
                Ok(Vec::new())
            }
        }
    }
}

fn static_zones() -> Vec<String> {
    STATIC_ZONES.iter().map(|z| z.to_string()).collect()
}

/// Extract a record from a `/v1/latest` response body.
///
/// Returns `Ok(None)` when any required field is missing.
pub fn parse_response(body: &str) -> Result<Option<IntensityRecord>> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| Error::ParseError(format!("response is not valid JSON: {e}")))?;

    let str_at = |pointer: &str| json.pointer(pointer).and_then(|v| v.as_str());
    let f64_at = |pointer: &str| json.pointer(pointer).and_then(|v| v.as_f64());

    let Some(country_code) = str_at("/countryCode") else {
        return Ok(None);
    };
    let Some(status) = str_at("/status") else {
        return Ok(None);
    };
    let Some(datetime) = str_at("/data/datetime") else {
        return Ok(None);
    };
    let Some(carbon_intensity) = f64_at("/data/carbonIntensity") else {
        return Ok(None);
    };
    let Some(fossil_fuel_percentage) = f64_at("/data/fossilFuelPercentage") else {
        return Ok(None);
    };
    let Some(unit_name) = json
        .get("units")
        .and_then(|u| u.as_object())
        .and_then(|u| u.keys().min())
    else {
        return Ok(None);
    };
    let Some(unit_value) = str_at("/units/carbonIntensity") else {
        return Ok(None);
    };

    Ok(Some(IntensityRecord {
        key: country_code.to_string(),
        country_code: country_code.to_string(),
        country_name: String::new(),
        zone_name: String::new(),
        status: status.to_string(),
        datetime: datetime.to_string(),
        carbon_intensity,
        fossil_fuel_percentage,
        unit_name: unit_name.clone(),
        unit_value: unit_value.to_string(),
    }))
}
