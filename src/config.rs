//! Application configuration
//!
//! Loaded once at startup from a TOML file and passed by value into the
//! orchestrator. The three variant keys select the data source, reader and
//! publisher from the registries in [`crate::orchestrator`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Publisher forced by `--dry-run`
pub const DRY_RUN_PUBLISHER: &str = "console-publisher";

/// Top-level configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    /// Data source variant key (e.g. "co2-signal")
    pub data_source: String,
    /// Reader variant key (e.g. "one-shot")
    pub reader: String,
    /// Publisher variant key (e.g. "kafka-publisher")
    pub data_publisher: String,
    /// Set by the CLI, never read from the file
    #[serde(skip)]
    pub dry_run: bool,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub co2_signal: Co2SignalConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
}

impl AppConfig {
    /// Create a config selecting the given variants, all other settings default
    pub fn new(data_source: &str, reader: &str, data_publisher: &str) -> Self {
        Self {
            data_source: data_source.to_string(),
            reader: reader.to_string(),
            data_publisher: data_publisher.to_string(),
            dry_run: false,
            sweep: SweepConfig::default(),
            shutdown: ShutdownConfig::default(),
            co2_signal: Co2SignalConfig::default(),
            kafka: KafkaConfig::default(),
        }
    }

    /// Load and parse the configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "cannot read configuration file {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::from_toml(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the publisher with the console variant
    pub fn apply_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
        if dry_run {
            info!(
                configured = %self.data_publisher,
                "Running with --dry-run, publishing to {}", DRY_RUN_PUBLISHER
            );
            self.data_publisher = DRY_RUN_PUBLISHER.to_string();
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("data-source", &self.data_source),
            ("reader", &self.reader),
            ("data-publisher", &self.data_publisher),
        ] {
            if value.trim().is_empty() {
                return Err(Error::ConfigError(format!("{name} must not be empty")));
            }
        }
        for (name, value) in [
            ("sweep.fetch-timeout-secs", self.sweep.fetch_timeout_secs),
            ("sweep.timer-period-secs", self.sweep.timer_period_secs),
            ("shutdown.timeout-secs", self.shutdown.timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::ConfigError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// What a reader does when one zone cannot be fetched
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ZoneFailurePolicy {
    /// Log the failure and move on to the next zone
    #[default]
    Skip,
    /// Stop the sweep and surface the error to the orchestrator
    Abort,
}

/// Reader cadence settings
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SweepConfig {
    /// Delay between zones (upstream rate limit)
    pub rate_limit_ms: u64,
    /// Upper bound on a single zone fetch
    pub fetch_timeout_secs: u64,
    /// Period between sweeps for the timer reader
    pub timer_period_secs: u64,
    pub zone_failure: ZoneFailurePolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 1000,
            fetch_timeout_secs: 30,
            timer_period_secs: 120,
            zone_failure: ZoneFailurePolicy::Skip,
        }
    }
}

impl SweepConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_secs(self.timer_period_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ShutdownConfig {
    /// Bound on draining the channel and joining the reader
    pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// CO2 Signal provider settings
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Co2SignalConfig {
    /// API base URL
    pub api_url: String,
    /// Zone discovery endpoint
    pub zones_url: String,
    /// Environment variable holding the API token
    pub api_key_env: String,
    /// Fixed zone list; discovery is skipped when set
    pub zones: Option<Vec<String>>,
}

impl Default for Co2SignalConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.co2signal.com".to_string(),
            zones_url: "https://api.electricitymap.org/v3/zones".to_string(),
            api_key_env: "CO2SIGNAL_API_KEY".to_string(),
            zones: None,
        }
    }
}

/// Kafka sink settings
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers
    pub brokers: String,
    pub topic: String,
    pub message_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "carbon-intensity".to_string(),
            message_timeout_ms: 5000,
        }
    }
}

impl KafkaConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}
