// src/config/mod.rs
//! Process configuration, read from the environment (after `.env`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::publish::PUBLISH_TIMEOUT;

// --- env names & defaults ---
pub const ENV_KAFKA_BROKERS: &str = "KAFKA_BROKERS";
pub const ENV_KAFKA_TOPIC: &str = "KAFKA_TOPIC";
pub const ENV_KAFKA_CLIENT_ID: &str = "KAFKA_CLIENT_ID";
pub const ENV_SOURCES_DIR: &str = "SOURCES_DIR";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";
pub const DEFAULT_KAFKA_TOPIC: &str = "data.raw";
pub const DEFAULT_KAFKA_CLIENT_ID: &str = "data-ingestor";
pub const DEFAULT_SOURCES_DIR: &str = "./sources/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub client_id: String,
    /// Bus-side delivery timeout; matches the publish timeout.
    pub delivery_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub sources_dir: PathBuf,
    pub bus: BusConfig,
    pub metrics_addr: Option<SocketAddr>,
    pub log_format: LogFormat,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let brokers = parse_brokers(&get(ENV_KAFKA_BROKERS).unwrap_or_else(|| DEFAULT_KAFKA_BROKERS.into()));
        let metrics_addr = get(ENV_METRICS_ADDR)
            .map(|raw| {
                raw.trim()
                    .parse::<SocketAddr>()
                    .with_context(|| format!("{ENV_METRICS_ADDR}='{raw}' is not a socket address"))
            })
            .transpose()?;
        let log_format = match get(ENV_LOG_FORMAT).map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(Self {
            sources_dir: PathBuf::from(get(ENV_SOURCES_DIR).unwrap_or_else(|| DEFAULT_SOURCES_DIR.into())),
            bus: BusConfig {
                brokers,
                topic: get(ENV_KAFKA_TOPIC).unwrap_or_else(|| DEFAULT_KAFKA_TOPIC.into()),
                client_id: get(ENV_KAFKA_CLIENT_ID).unwrap_or_else(|| DEFAULT_KAFKA_CLIENT_ID.into()),
                delivery_timeout: PUBLISH_TIMEOUT,
            },
            metrics_addr,
            log_format,
        })
    }
}

fn parse_brokers(raw: &str) -> Vec<String> {
    let brokers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if brokers.is_empty() {
        vec![DEFAULT_KAFKA_BROKERS.to_string()]
    } else {
        brokers
    }
}
