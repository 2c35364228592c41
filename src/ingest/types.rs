// src/ingest/types.rs
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fixed set of categories a source may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Environmental,
    Health,
    Infrastructure,
    Economic,
    Social,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Environmental,
        Category::Health,
        Category::Infrastructure,
        Category::Economic,
        Category::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Environmental => "environmental",
            Category::Health => "health",
            Category::Infrastructure => "infrastructure",
            Category::Economic => "economic",
            Category::Social => "social",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "invalid category '{s}'. Valid categories are: environmental, health, infrastructure, economic, social"
                )
            })
    }
}

/// One validated source definition, loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDefinition {
    pub name: String,
    /// Selects the extraction capability (e.g. "http_fetch").
    pub kind: String,
    pub category: Category,
    pub frequency: Duration,
    /// Open, type-specific mapping.
    pub config: Map<String, Value>,
    /// File the definition was loaded from (diagnostics only).
    pub origin: PathBuf,
}

/// Immutable per-tick view of a source's type-specific config, with the
/// owning source's `source` and `category` merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerConfig {
    values: Map<String, Value>,
}

impl HandlerConfig {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Build the augmented config handed to a capability on each invocation.
    /// `source` and `category` always reflect the definition, overriding any
    /// same-named keys the author placed in `config`.
    pub fn for_source(def: &SourceDefinition) -> Self {
        let mut values = def.config.clone();
        values.insert("category".into(), Value::String(def.category.to_string()));
        values.insert("source".into(), Value::String(def.name.clone()));
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for HandlerConfig {
    fn from(values: Map<String, Value>) -> Self {
        Self::new(values)
    }
}

/// A single timestamped, geolocated measurement.
///
/// Doubles as the protobuf wire message (`proto.v1.DataPoint`) and the JSON
/// fallback shape.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct DataPoint {
    #[prost(string, tag = "1")]
    pub source: String,

    /// Capture time, milliseconds since the Unix epoch.
    #[prost(int64, tag = "2")]
    pub epoch_ms: i64,

    #[prost(double, tag = "3")]
    pub value: f64,

    #[prost(double, tag = "4")]
    pub lat: f64,

    #[prost(double, tag = "5")]
    pub lon: f64,

    #[prost(string, tag = "6")]
    pub variable: String,

    #[prost(string, tag = "7")]
    pub units: String,

    /// Spatial resolution label, e.g. "point".
    #[prost(string, tag = "8")]
    pub resolution: String,

    /// Globally identifying token.
    #[prost(string, tag = "9")]
    pub uuid: String,

    #[prost(string, tag = "10")]
    pub category: String,
}
