// src/ingest/extract.rs
//! Builds typed [`DataPoint`]s out of a JSON document.
//!
//! Mode selection:
//! - config has a `data_points` list: one point per entry;
//! - otherwise the whole config is a single point description.
//!
//! Extraction is all-or-nothing. Any failing entry fails the whole call and
//! no partial batch is returned.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::ingest::jsonpath::select_required;
use crate::ingest::types::{DataPoint, HandlerConfig};

pub const DEFAULT_VARIABLE: &str = "unknown";
pub const DEFAULT_UNITS: &str = "unknown";
pub const DEFAULT_RESOLUTION: &str = "point";

pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LON_RANGE: (f64, f64) = (-180.0, 180.0);

/// Extract points from a canonical JSON byte form.
pub fn extract_points(canonical: &[u8], config: &HandlerConfig) -> Result<Vec<DataPoint>, FetchError> {
    let doc: Value = serde_json::from_slice(canonical)?;
    extract_from_value(&doc, config)
}

/// Same as [`extract_points`] for an already parsed document.
pub fn extract_from_value(doc: &Value, config: &HandlerConfig) -> Result<Vec<DataPoint>, FetchError> {
    let source = config.str_or("source", "unknown");
    let category = config.str_or("category", "");

    match config.get("data_points") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| match entry {
                Value::Object(sub) => extract_one(doc, sub, source, category),
                _ => Err(FetchError::MissingField("response_path")),
            })
            .collect(),
        _ => extract_one(doc, config.as_map(), source, category).map(|p| vec![p]),
    }
}

fn extract_one(
    doc: &Value,
    sub: &Map<String, Value>,
    source: &str,
    category: &str,
) -> Result<DataPoint, FetchError> {
    let path = sub
        .get("response_path")
        .and_then(Value::as_str)
        .ok_or(FetchError::MissingField("response_path"))?;
    let value = coerce_f64(select_required(doc, path)?, path)?;

    let coords = sub.get("coordinates").and_then(Value::as_object);
    let lat = resolve_axis(doc, coords, "lat_path", "lat")?;
    let lon = resolve_axis(doc, coords, "lon_path", "lon")?;
    check_range("lat", lat, LAT_RANGE)?;
    check_range("lon", lon, LON_RANGE)?;

    let text = |key: &str, default: &str| {
        sub.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let variable = text("variable", DEFAULT_VARIABLE);
    let station_id = sub.get("station_id").and_then(scalar_to_string);

    Ok(DataPoint {
        source: source.to_string(),
        epoch_ms: Utc::now().timestamp_millis(),
        value,
        lat,
        lon,
        uuid: make_token(source, &variable, station_id.as_deref(), unique_nanos()),
        variable,
        units: text("units", DEFAULT_UNITS),
        resolution: text("resolution", DEFAULT_RESOLUTION),
        category: category.to_string(),
    })
}

fn resolve_axis(
    doc: &Value,
    coords: Option<&Map<String, Value>>,
    path_key: &'static str,
    literal_key: &'static str,
) -> Result<f64, FetchError> {
    let coords = coords.ok_or(FetchError::MissingCoordinates(
        "either lat_path/lon_path or lat/lon is required",
    ))?;
    if let Some(path) = coords.get(path_key).and_then(Value::as_str) {
        return coerce_f64(select_required(doc, path)?, path);
    }
    match coords.get(literal_key) {
        Some(v) => v.as_f64().ok_or_else(|| FetchError::NotNumeric {
            path: format!("coordinates.{literal_key}"),
            found: v.to_string(),
        }),
        None => Err(FetchError::MissingCoordinates(if literal_key == "lat" {
            "lat or lat_path is required"
        } else {
            "lon or lon_path is required"
        })),
    }
}

fn check_range(axis: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), FetchError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(FetchError::OutOfRange {
            axis,
            value,
            min,
            max,
        })
    }
}

/// Coerce a resolved JSON value to `f64`.
///
/// Numbers pass through, numeric strings are parsed and booleans map to
/// 1.0/0.0. Anything else, including `"NaN"` and `"inf"`, is rejected.
pub fn coerce_f64(value: &Value, path: &str) -> Result<f64, FetchError> {
    let not_numeric = || FetchError::NotNumeric {
        path: path.to_string(),
        found: value.to_string(),
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).ok_or_else(not_numeric)
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `{source}_{variable}[_{station_id}]_{nanos}`.
pub fn make_token(source: &str, variable: &str, station_id: Option<&str>, nanos: i64) -> String {
    match station_id {
        Some(station) => format!("{source}_{variable}_{station}_{nanos}"),
        None => format!("{source}_{variable}_{nanos}"),
    }
}

static LAST_NANOS: AtomicI64 = AtomicI64::new(0);

/// Wall-clock nanoseconds, bumped so that no two calls in this process return
/// the same value.
pub fn unique_nanos() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut prev = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev.saturating_add(1));
        match LAST_NANOS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}
