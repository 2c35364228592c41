// src/publish/codec.rs
//! Point encoders: compact protobuf first, JSON as the fallback.

use std::fmt;

use anyhow::{Context, Result};
use prost::Message;

use crate::ingest::types::DataPoint;

/// Wire format of an encoded point, carried in the `format` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Protobuf,
    Json,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Protobuf => "protobuf",
            Format::Json => "json",
        }
    }

    pub fn from_header(value: &[u8]) -> Option<Self> {
        match value {
            b"protobuf" => Some(Format::Protobuf),
            b"json" => Some(Format::Json),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait PointEncoder: Send + Sync {
    fn format(&self) -> Format;
    fn encode(&self, point: &DataPoint) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProtobufEncoder;

impl PointEncoder for ProtobufEncoder {
    fn format(&self) -> Format {
        Format::Protobuf
    }

    fn encode(&self, point: &DataPoint) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(point.encoded_len());
        point.encode(&mut buf).context("protobuf encode")?;
        Ok(buf)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl PointEncoder for JsonEncoder {
    fn format(&self) -> Format {
        Format::Json
    }

    fn encode(&self, point: &DataPoint) -> Result<Vec<u8>> {
        serde_json::to_vec(point).context("json encode")
    }
}

/// Decode a payload produced by either encoder.
pub fn decode_point(format: Format, payload: &[u8]) -> Result<DataPoint> {
    match format {
        Format::Protobuf => DataPoint::decode(payload).context("protobuf decode"),
        Format::Json => serde_json::from_slice(payload).context("json decode"),
    }
}
