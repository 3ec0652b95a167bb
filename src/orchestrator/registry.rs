//! Name → constructor registries for the three pluggable roles

use crate::config::AppConfig;
use crate::data_source::{Co2SignalDataSource, DataSource, Simulator};
use crate::error::{Error, Result};
use crate::publisher::{ConsolePublisher, KafkaPublisher, Publisher};
use crate::reader::{OneShotReader, Reader, SweepSettings, TimerReader};
use std::collections::BTreeMap;

type Constructor<T> = fn(&AppConfig) -> Box<T>;

/// Static registry of the variants available for one role
pub struct Registry<T: ?Sized> {
    role: &'static str,
    entries: BTreeMap<&'static str, Constructor<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            entries: BTreeMap::new(),
        }
    }

    pub fn register(mut self, key: &'static str, constructor: Constructor<T>) -> Self {
        self.entries.insert(key, constructor);
        self
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Build the variant named `key`
    pub fn resolve(&self, key: &str, config: &AppConfig) -> Result<Box<T>> {
        match self.entries.get(key) {
            Some(constructor) => Ok(constructor(config)),
            None => Err(Error::UnknownVariant {
                role: self.role,
                requested: key.to_string(),
                options: self.keys().into_iter().map(String::from).collect(),
            }),
        }
    }
}

pub fn data_sources() -> Registry<dyn DataSource> {
    Registry::<dyn DataSource>::new("data source")
        .register("co2-signal", |config| {
            Box::new(Co2SignalDataSource::new(
                config.co2_signal.clone(),
                config.sweep.fetch_timeout(),
            ))
        })
        .register("simulator", |_| Box::new(Simulator::new()))
}

pub fn readers() -> Registry<dyn Reader> {
    Registry::<dyn Reader>::new("reader")
        .register("one-shot", |config| {
            Box::new(OneShotReader::new(SweepSettings::from(&config.sweep)))
        })
        .register("time-reader", |config| {
            Box::new(TimerReader::new(
                SweepSettings::from(&config.sweep),
                config.sweep.timer_period(),
            ))
        })
}

pub fn publishers() -> Registry<dyn Publisher> {
    Registry::<dyn Publisher>::new("publisher")
        .register("console-publisher", |_| Box::new(ConsolePublisher::new()))
        .register("kafka-publisher", |config| {
            Box::new(KafkaPublisher::new(config.kafka.clone()))
        })
}
