// src/ingest/env.rs
//! `${NAME}` substitution for header values.

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{([^{}]+)\}$").expect("placeholder regex"));

/// Replace a value of the exact form `${NAME}` with `lookup(NAME)`.
///
/// A missing variable yields an empty string. Values that are not a single
/// placeholder are returned unchanged.
pub fn interpolate<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match PLACEHOLDER.captures(value).and_then(|c| c.get(1)) {
        Some(name) => lookup(name.as_str()).unwrap_or_default(),
        None => value.to_string(),
    }
}

/// [`interpolate`] against the process environment.
pub fn interpolate_env(value: &str) -> String {
    interpolate(value, |name| std::env::var(name).ok())
}
