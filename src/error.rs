//! Error taxonomy for the ingestion pipeline.
//!
//! Each class maps to a recovery policy:
//! - [`ConfigError`] aborts startup.
//! - [`CapabilityError`] / [`ValidationError`] disable one source for the run.
//! - [`FetchError`] / [`PublishError`] abort a single tick; the worker keeps going.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A source definition file could not be loaded or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration in {path}: field `{field}`: {reason}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    #[error("duplicate source name '{name}' in {path} (first defined in {first})")]
    DuplicateName {
        name: String,
        path: PathBuf,
        first: PathBuf,
    },

    #[error("source directory {path} is not readable: {reason}")]
    Directory { path: PathBuf, reason: String },
}

/// No usable capability for a source type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("no such capability: {0}")]
    Unknown(String),

    #[error("{0} not implemented")]
    NotImplemented(String),

    #[error("failed to initialise {kind}: {reason}")]
    Init { kind: String, reason: String },
}

/// Type-specific configuration rejected by a capability's `validate`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required for {kind}")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("{field} is invalid for {kind}: {reason}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// One fetch/extract cycle failed. Only the current tick is lost.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build request: {0}")]
    Request(String),

    #[error("failed to fetch data: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} is required in each data point configuration")]
    MissingField(&'static str),

    #[error("invalid path query '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path {0} not found in JSON")]
    PathNotFound(String),

    #[error("value at {path} is not numeric: {found}")]
    NotNumeric { path: String, found: String },

    #[error("coordinates missing: {0}")]
    MissingCoordinates(&'static str),

    #[error("{axis} {value} out of range [{min}, {max}]")]
    OutOfRange {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Encoding or bus submission failed for a batch.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode point {uuid}: {reason}")]
    Encode { uuid: String, reason: String },

    #[error("failed to write messages to bus: {0}")]
    Bus(String),

    #[error("bus submission timed out after {0:?}")]
    Timeout(Duration),
}
