// src/publish/kafka.rs
//! Kafka transport backed by `rdkafka`'s `FutureProducer`.
//!
//! `FutureProducer` is `Clone + Send + Sync` and designed to be shared, so
//! the bus needs no extra locking for concurrent batches.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::info;

use crate::config::BusConfig;
use crate::error::PublishError;
use crate::publish::{MessageBus, OutboundMessage};

pub struct KafkaBus {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaBus {
    pub fn new(cfg: &BusConfig) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", cfg.brokers.join(","))
            .set("client.id", &cfg.client_id)
            .set("message.timeout.ms", cfg.delivery_timeout.as_millis().to_string())
            .create()
            .map_err(|e| PublishError::Bus(format!("failed to create Kafka producer: {e}")))?;

        info!(brokers = ?cfg.brokers, topic = %cfg.topic, "Kafka producer configured");

        Ok(Self {
            producer,
            queue_timeout: cfg.delivery_timeout,
        })
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn send_batch(&self, topic: &str, messages: Vec<OutboundMessage>) -> Result<(), PublishError> {
        let total = messages.len();
        let sends = messages.iter().map(|m| {
            let headers = m.headers.iter().fold(
                OwnedHeaders::new_with_capacity(m.headers.len()),
                |acc, (key, value)| {
                    acc.insert(Header {
                        key: key.as_str(),
                        value: Some(value.as_slice()),
                    })
                },
            );
            let record = FutureRecord::to(topic)
                .key(m.key.as_slice())
                .payload(m.payload.as_slice())
                .headers(headers);
            self.producer.send(record, Timeout::After(self.queue_timeout))
        });

        let failures: Vec<String> = join_all(sends)
            .await
            .into_iter()
            .filter_map(|res| res.err().map(|(e, _msg)| e.to_string()))
            .collect();

        match failures.first() {
            None => Ok(()),
            Some(first) => Err(PublishError::Bus(format!(
                "{} of {total} messages to {topic} failed: {first}",
                failures.len()
            ))),
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<(), PublishError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| PublishError::Bus(format!("flush task failed: {e}")))?
            .map_err(|e| PublishError::Bus(format!("flush failed: {e}")))
    }
}
