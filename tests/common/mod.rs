// tests/common/mod.rs
// Shared test doubles: a recording message bus and a few builders.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use data_ingestor::error::PublishError;
use data_ingestor::ingest::types::{DataPoint, HandlerConfig};
use data_ingestor::publish::{Format, MessageBus, OutboundMessage, PointEncoder};
use parking_lot::Mutex;
use serde_json::Value;

/// Records every `send_batch` call as one entry.
#[derive(Default)]
pub struct RecordingBus {
    pub batches: Mutex<Vec<(String, Vec<OutboundMessage>)>>,
    pub calls: AtomicUsize,
    pub fail_with: Mutex<Option<String>>,
    pub delay: Mutex<Option<Duration>>,
}

impl RecordingBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(msg: &str) -> Arc<Self> {
        let bus = Self::default();
        *bus.fail_with.lock() = Some(msg.to_string());
        Arc::new(bus)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        let bus = Self::default();
        *bus.delay.lock() = Some(delay);
        Arc::new(bus)
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.batches
            .lock()
            .iter()
            .flat_map(|(_, m)| m.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn send_batch(&self, topic: &str, messages: Vec<OutboundMessage>) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if let Some(msg) = self.fail_with.lock().clone() {
            return Err(PublishError::Bus(msg));
        }
        self.batches.lock().push((topic.to_string(), messages));
        Ok(())
    }
}

/// Primary encoder that always fails, to exercise the JSON fallback.
pub struct BrokenEncoder;

impl PointEncoder for BrokenEncoder {
    fn format(&self) -> Format {
        Format::Protobuf
    }

    fn encode(&self, _point: &DataPoint) -> Result<Vec<u8>> {
        Err(anyhow!("schema registry unavailable"))
    }
}

pub fn point(source: &str, variable: &str, value: f64) -> DataPoint {
    DataPoint {
        source: source.to_string(),
        epoch_ms: 1_700_000_000_000,
        value,
        lat: 52.52,
        lon: 13.41,
        variable: variable.to_string(),
        units: "celsius".to_string(),
        resolution: "point".to_string(),
        uuid: format!("{source}_{variable}_1"),
        category: "environmental".to_string(),
    }
}

pub fn cfg(v: Value) -> HandlerConfig {
    HandlerConfig::new(v.as_object().cloned().expect("config must be an object"))
}

/// Serve `router` on an ephemeral local port.
pub async fn serve(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    addr
}
