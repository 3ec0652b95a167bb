//! Kafka publisher
//!
//! Requires the `kafka` feature. Without it the variant is still selectable
//! but refuses to initialise, so a misconfigured deployment fails at startup.

use crate::config::KafkaConfig;
use crate::error::{Error, Result};
use crate::publisher::Publisher;
use async_trait::async_trait;

#[cfg(feature = "kafka")]
use rdkafka::{
    config::ClientConfig,
    error::{KafkaError, RDKafkaErrorCode},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
#[cfg(feature = "kafka")]
use tracing::{debug, info, warn};

pub struct KafkaPublisher {
    config: KafkaConfig,
    #[cfg(feature = "kafka")]
    producer: Option<FutureProducer>,
}

impl KafkaPublisher {
    pub fn new(config: KafkaConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "kafka")]
            producer: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }
}

#[cfg(feature = "kafka")]
impl KafkaPublisher {
    fn producer(&self) -> Result<&FutureProducer> {
        self.producer.as_ref().ok_or_else(|| {
            Error::ConnectionError("Kafka publisher used before initialise()".to_string())
        })
    }
}

/// Map a producer error onto the dispatch loop's recover/escalate split
#[cfg(feature = "kafka")]
fn classify(err: KafkaError) -> Error {
    match err.rdkafka_error_code() {
        Some(
            RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::Authentication,
        ) => Error::ConnectionError(err.to_string()),
        _ => Error::PublishError(err.to_string()),
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl Publisher for KafkaPublisher {
    fn name(&self) -> &'static str {
        "kafka-publisher"
    }

    async fn initialise(&mut self) -> Result<()> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set(
                "message.timeout.ms",
                self.config.message_timeout_ms.to_string(),
            )
            .create()
            .map_err(|e| Error::ConnectionError(format!("cannot create Kafka producer: {e}")))?;

        // Metadata fetch blocks until a broker answers or the timeout expires
        let probe = producer.clone();
        let topic = self.config.topic.clone();
        let timeout = self.config.message_timeout();
        tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(Some(&topic), Timeout::After(timeout))
        })
        .await
        .map_err(|e| Error::ConnectionError(format!("metadata probe panicked: {e}")))?
        .map_err(|e| {
            Error::ConnectionError(format!(
                "cannot reach Kafka brokers {}: {e}",
                self.config.brokers
            ))
        })?;

        info!(
            brokers = %self.config.brokers,
            topic = %self.config.topic,
            "Connected Kafka publisher"
        );
        self.producer = Some(producer);
        Ok(())
    }

    async fn publish(&mut self, key: &str, payload: &str) -> Result<()> {
        let producer = self.producer()?;
        let record = FutureRecord::to(&self.config.topic).key(key).payload(payload);

        match producer
            .send(record, Timeout::After(self.config.message_timeout()))
            .await
        {
            Ok(_) => {
                debug!(key, topic = %self.config.topic, "Message delivered");
                Ok(())
            }
            Err((err, _)) => {
                warn!(key, topic = %self.config.topic, error = %err, "Delivery failed");
                Err(classify(err))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        let timeout = self.config.message_timeout();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| Error::PublishError(format!("flush task panicked: {e}")))?
            .map_err(|e| Error::PublishError(format!("flush failed: {e}")))?;
        info!("Kafka publisher flushed");
        Ok(())
    }
}

#[cfg(not(feature = "kafka"))]
#[async_trait]
impl Publisher for KafkaPublisher {
    fn name(&self) -> &'static str {
        "kafka-publisher"
    }

    async fn initialise(&mut self) -> Result<()> {
        Err(Error::ConfigError(format!(
            "kafka-publisher (topic {}) is unavailable: rebuild with `--features kafka`",
            self.config.topic
        )))
    }

    async fn publish(&mut self, _key: &str, _payload: &str) -> Result<()> {
        Err(Error::ConnectionError(
            "kafka-publisher is not compiled in".to_string(),
        ))
    }
}
