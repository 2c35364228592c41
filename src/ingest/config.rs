// src/ingest/config.rs
//! Source registry: loads and validates source definitions from a directory.
//!
//! Loading is fail-fast. The first malformed file aborts the whole load, so a
//! single bad definition keeps the process from starting.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::ingest::types::{Category, SourceDefinition};

/// Extensions recognised as source definition files.
pub const SOURCE_EXTENSIONS: [&str; 3] = ["yaml", "yml", "toml"];

/// On-disk shape, before validation.
#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    config: Option<Map<String, Value>>,
}

/// Recursively load every recognised file under `dir`.
///
/// Files are visited in sorted path order. Names must be unique across the
/// directory.
pub fn load(dir: &Path) -> Result<Vec<SourceDefinition>, ConfigError> {
    let mut defs = Vec::new();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ConfigError::Directory {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() || !has_source_extension(entry.path()) {
            continue;
        }

        let def = load_file(entry.path())?;
        if let Some(first) = seen.get(&def.name) {
            return Err(ConfigError::DuplicateName {
                name: def.name,
                path: entry.path().to_path_buf(),
                first: first.clone(),
            });
        }
        seen.insert(def.name.clone(), def.origin.clone());
        defs.push(def);
    }

    Ok(defs)
}

/// Load and validate a single definition file.
pub fn load_file(path: &Path) -> Result<SourceDefinition, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = parse_raw(path, &content)?;
    validate(path, raw)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_raw(path: &Path, content: &str) -> Result<RawSource, ConfigError> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let parsed = if ext == "toml" {
        toml::from_str::<RawSource>(content).map_err(|e| e.to_string())
    } else {
        serde_yml::from_str::<RawSource>(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

fn validate(path: &Path, raw: RawSource) -> Result<SourceDefinition, ConfigError> {
    let invalid = |field: &'static str, reason: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        field,
        reason,
    };
    let required = |field: &'static str, v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid(field, format!("source {field} cannot be empty")))
    };

    let name = required("name", raw.name)?;
    let kind = required("type", raw.kind)?;
    let category: Category = required("category", raw.category)?
        .parse()
        .map_err(|reason| invalid("category", reason))?;
    let frequency_raw = required("frequency", raw.frequency)?;
    let frequency = parse_frequency(&frequency_raw).map_err(|e| {
        invalid(
            "frequency",
            format!("invalid frequency format '{frequency_raw}': {e}"),
        )
    })?;

    Ok(SourceDefinition {
        name,
        kind,
        category,
        frequency,
        config: raw.config.unwrap_or_default(),
        origin: path.to_path_buf(),
    })
}

/// Parse a duration such as `"15s"`, `"1h30m"`, `"1.5m"` or `"250ms"`.
/// The result must be strictly positive.
pub fn parse_frequency(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".into());
    }
    if s.starts_with('-') {
        return Err("duration must be positive".into());
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    let mut total_nanos: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(format!("expected a number in '{input}'"));
        }
        let number: f64 = rest[..num_len]
            .parse()
            .map_err(|_| format!("invalid number '{}'", &rest[..num_len]))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(format!("missing unit in duration '{input}'")),
            other => return Err(format!("unknown unit '{other}' in duration '{input}'")),
        };
        total_nanos += number * scale;
        rest = &rest[unit_len..];
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err("duration overflows".into());
    }
    let nanos = total_nanos.round() as u64;
    if nanos == 0 {
        return Err("duration must be positive".into());
    }
    Ok(Duration::from_nanos(nanos))
}
