// src/publish/mod.rs
//! Publisher: encodes data points and submits them to the message bus.
//!
//! One [`Publisher`] is shared by every scheduler worker. It holds no mutable
//! state of its own; concurrency safety is delegated to the [`MessageBus`]
//! implementation (the Kafka producer is thread-safe).

pub mod codec;
#[cfg(feature = "kafka")]
pub mod kafka;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use crate::error::PublishError;
use crate::ingest::types::DataPoint;

pub use codec::{decode_point, Format, JsonEncoder, PointEncoder, ProtobufEncoder};
#[cfg(feature = "kafka")]
pub use kafka::KafkaBus;

/// Upper bound for one batch submission.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

pub const HEADER_SOURCE: &str = "source";
pub const HEADER_VARIABLE: &str = "variable";
pub const HEADER_CATEGORY: &str = "category";
pub const HEADER_FORMAT: &str = "format";

/// A fully encoded bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Partition key (source name).
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl OutboundMessage {
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn format(&self) -> Option<Format> {
        self.header(HEADER_FORMAT).and_then(Format::from_header)
    }
}

/// Transport seam. Implementations must tolerate concurrent `send_batch`
/// calls from many workers.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Submit all messages. Any failure fails the whole call; no guarantee
    /// is made about which messages were accepted.
    async fn send_batch(&self, topic: &str, messages: Vec<OutboundMessage>) -> Result<(), PublishError>;

    /// Wait for in-flight deliveries, up to `timeout`.
    async fn flush(&self, _timeout: Duration) -> Result<(), PublishError> {
        Ok(())
    }
}

pub struct Publisher {
    bus: Arc<dyn MessageBus>,
    topic: String,
    primary: Box<dyn PointEncoder>,
    fallback: JsonEncoder,
    timeout: Duration,
}

impl Publisher {
    pub fn new(bus: Arc<dyn MessageBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            primary: Box::new(ProtobufEncoder),
            fallback: JsonEncoder,
            timeout: PUBLISH_TIMEOUT,
        }
    }

    /// Replace the primary (binary) encoder.
    pub fn with_primary_encoder(mut self, encoder: impl PointEncoder + 'static) -> Self {
        self.primary = Box::new(encoder);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode one point, falling back to JSON if the primary encoder fails.
    /// The `format` header names the encoding actually used.
    pub fn encode_point(&self, point: &DataPoint) -> Result<OutboundMessage, PublishError> {
        let (payload, format) = match self.primary.encode(point) {
            Ok(bytes) => (bytes, self.primary.format()),
            Err(e) => {
                warn!(
                    source = %point.source,
                    error = %e,
                    "failed to encode with {}, falling back to JSON",
                    self.primary.format()
                );
                counter!("publish_json_fallback_total", "source" => point.source.clone())
                    .increment(1);
                let bytes = self.fallback.encode(point).map_err(|e| PublishError::Encode {
                    uuid: point.uuid.clone(),
                    reason: e.to_string(),
                })?;
                (bytes, self.fallback.format())
            }
        };

        Ok(OutboundMessage {
            key: point.source.as_bytes().to_vec(),
            payload,
            headers: vec![
                (HEADER_SOURCE.to_string(), point.source.as_bytes().to_vec()),
                (HEADER_VARIABLE.to_string(), point.variable.as_bytes().to_vec()),
                (HEADER_CATEGORY.to_string(), point.category.as_bytes().to_vec()),
                (HEADER_FORMAT.to_string(), format.as_str().as_bytes().to_vec()),
            ],
        })
    }

    /// Encode and submit `batch` in one bus call. An empty batch is a no-op.
    pub async fn publish(&self, batch: &[DataPoint]) -> Result<(), PublishError> {
        if batch.is_empty() {
            return Ok(());
        }

        let messages = batch
            .iter()
            .map(|p| self.encode_point(p))
            .collect::<Result<Vec<_>, _>>()?;
        let count = messages.len();

        let submitted = tokio::time::timeout(self.timeout, self.bus.send_batch(&self.topic, messages))
            .await
            .map_err(|_| PublishError::Timeout(self.timeout))
            .and_then(|r| r);

        match submitted {
            Ok(()) => {
                counter!("publish_messages_total").increment(count as u64);
                debug!(topic = %self.topic, messages = count, "published batch");
                Ok(())
            }
            Err(e) => {
                counter!("publish_errors_total").increment(1);
                Err(e)
            }
        }
    }

    pub async fn publish_one(&self, point: &DataPoint) -> Result<(), PublishError> {
        self.publish(std::slice::from_ref(point)).await
    }

    /// Flush the bus, bounded by the publish timeout.
    pub async fn flush(&self) -> Result<(), PublishError> {
        self.bus.flush(self.timeout).await
    }
}
