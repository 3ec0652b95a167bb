//! Types shared by data sources

use serde::{Deserialize, Serialize};

/// One reading for a zone, payload already serialized
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataSourceDetails {
    /// Zone key; empty means "no usable reading"
    pub zone_key: String,
    /// Serialized reading (JSON in practice)
    pub payload: String,
}

impl DataSourceDetails {
    pub fn new(zone_key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            zone_key: zone_key.into(),
            payload: payload.into(),
        }
    }

    /// A reading may only be forwarded when it carries a key
    pub fn is_valid(&self) -> bool {
        !self.zone_key.is_empty()
    }
}

/// Normalized carbon-intensity record published downstream
///
/// Field names are part of the downstream message schema.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct IntensityRecord {
    pub key: String,
    pub country_code: String,
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub zone_name: String,
    pub status: String,
    /// Upstream timestamp, passed through verbatim
    pub datetime: String,
    /// gCO2eq/kWh
    pub carbon_intensity: f64,
    #[serde(rename = "fossel_fuel_percentage")]
    pub fossil_fuel_percentage: f64,
    pub unit_name: String,
    pub unit_value: String,
}

impl IntensityRecord {
    /// Serialize into a reading keyed by `key`
    pub fn into_details(self) -> crate::Result<DataSourceDetails> {
        let payload = serde_json::to_string(&self)?;
        Ok(DataSourceDetails::new(self.key, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_invalid() {
        assert!(!DataSourceDetails::new("", "{}").is_valid());
        assert!(DataSourceDetails::new("FR", "{}").is_valid());
    }

    #[test]
    fn test_record_keeps_downstream_field_names() {
        let record = IntensityRecord {
            key: "FR".into(),
            country_code: "FR".into(),
            country_name: String::new(),
            zone_name: String::new(),
            status: "ok".into(),
            datetime: "2022-09-01T10:00:00.000Z".into(),
            carbon_intensity: 70.0,
            fossil_fuel_percentage: 10.5,
            unit_name: "carbonIntensity".into(),
            unit_value: "gCO2eq/kWh".into(),
        };
        let details = record.into_details().unwrap();
        assert_eq!(details.zone_key, "FR");

        let json: serde_json::Value = serde_json::from_str(&details.payload).unwrap();
        assert_eq!(json["key"], "FR");
        assert_eq!(json["fossel_fuel_percentage"], 10.5);
        assert_eq!(json["unit_value"], "gCO2eq/kWh");
        assert_eq!(json["datetime"], "2022-09-01T10:00:00.000Z");
        assert!(json.get("fossil_fuel_percentage").is_none());
    }
}
