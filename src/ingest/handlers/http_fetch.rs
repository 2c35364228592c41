// src/ingest/handlers/http_fetch.rs
//! `http_fetch`: request a JSON endpoint and extract points by path query.
//!
//! Config keys: `url` (required), `method` (default GET), `headers` and
//! `params` as ordered `{key, value}` lists, then either `response_path` +
//! `coordinates` or a `data_points` list (see [`crate::ingest::extract`]).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;

use crate::error::{CapabilityError, FetchError, ValidationError};
use crate::ingest::env::interpolate_env;
use crate::ingest::extract::extract_points;
use crate::ingest::handlers::{Handler, HTTP_FETCH};
use crate::ingest::types::{DataPoint, HandlerConfig};

/// Per-request timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .user_agent(concat!("data-ingestor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CapabilityError::Init {
                kind: HTTP_FETCH.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_client(client))
    }

    /// Use a preconfigured client (custom TLS, proxies). Requests still carry
    /// [`FETCH_TIMEOUT`] unless overridden with [`HttpFetcher::with_timeout`].
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_request(&self, config: &HandlerConfig) -> Result<reqwest::RequestBuilder, FetchError> {
        let url = config
            .get_str("url")
            .ok_or_else(|| FetchError::Request("url is required for http_fetch".into()))?;
        let method_raw = config.str_or("method", "GET").to_ascii_uppercase();
        let method = Method::from_bytes(method_raw.as_bytes())
            .map_err(|_| FetchError::Request(format!("invalid method '{method_raw}'")))?;

        // Later entries with the same name replace earlier ones.
        let mut headers = HeaderMap::new();
        for (key, value) in key_value_pairs(config.get("headers")) {
            let value = interpolate_env(&value);
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| FetchError::Request(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| FetchError::Request(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let mut req = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .headers(headers);

        let params = key_value_pairs(config.get("params"));
        if !params.is_empty() {
            req = req.query(&params);
        }

        Ok(req)
    }
}

#[async_trait]
impl Handler for HttpFetcher {
    fn name(&self) -> &'static str {
        HTTP_FETCH
    }

    fn validate(&self, config: &HandlerConfig) -> Result<(), ValidationError> {
        let invalid = |field: &'static str, reason: &str| ValidationError::InvalidField {
            kind: HTTP_FETCH,
            field,
            reason: reason.to_string(),
        };

        match config.get("url") {
            None => {
                return Err(ValidationError::MissingField {
                    kind: HTTP_FETCH,
                    field: "url",
                })
            }
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(_) => return Err(invalid("url", "must be a non-empty string")),
        }

        if let Some(m) = config.get("method") {
            let ok = m
                .as_str()
                .map(|s| Method::from_bytes(s.to_ascii_uppercase().as_bytes()).is_ok())
                .unwrap_or(false);
            if !ok {
                return Err(invalid("method", "must be an HTTP method name"));
            }
        }

        for field in ["headers", "params"] {
            if let Some(v) = config.get(field) {
                if !is_key_value_list(v) {
                    return Err(invalid(field, "must be a list of {key, value} entries"));
                }
            }
        }

        if let Some(v) = config.get("data_points") {
            let entries = v
                .as_array()
                .ok_or_else(|| invalid("data_points", "must be a list"))?;
            let all_have_path = entries.iter().all(|e| {
                e.get("response_path")
                    .and_then(Value::as_str)
                    .is_some()
            });
            if !all_have_path {
                return Err(invalid("data_points", "every entry needs a response_path"));
            }
        }

        Ok(())
    }

    async fn fetch(&self, config: &HandlerConfig) -> Result<Vec<DataPoint>, FetchError> {
        let source = config.str_or("source", "unknown").to_string();
        let t0 = Instant::now();

        let resp = self.build_request(config)?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = resp.bytes().await?;
        let parsed: Value = serde_json::from_slice(&body)?;
        // Re-serialize so extraction always sees the same canonical form.
        let canonical = serde_json::to_vec(&parsed)?;

        histogram!("ingest_fetch_ms", "source" => source.clone())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_fetch_bytes_total", "source" => source).increment(body.len() as u64);

        extract_points(&canonical, config)
    }
}

fn is_key_value_list(v: &Value) -> bool {
    v.as_array().is_some_and(|items| {
        items
            .iter()
            .all(|it| it.get("key").is_some_and(Value::is_string) && it.get("value").is_some())
    })
}

/// Ordered `{key, value}` pairs. Non-string values are rendered as JSON
/// scalars (`1`, `true`), entries without a string `key` are skipped.
fn key_value_pairs(v: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|it| {
            let key = it.get("key")?.as_str()?.to_string();
            let value = match it.get("value")? {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(v: Value) -> HandlerConfig {
        HandlerConfig::new(v.as_object().cloned().unwrap())
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new().unwrap()
    }

    #[test]
    fn every_constructor_bounds_requests() {
        assert_eq!(fetcher().timeout(), FETCH_TIMEOUT);
        assert_eq!(HttpFetcher::with_client(Client::new()).timeout(), FETCH_TIMEOUT);
        let short = HttpFetcher::with_client(Client::new()).with_timeout(Duration::from_secs(2));
        assert_eq!(short.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn validate_requires_url() {
        let err = fetcher().validate(&cfg(json!({"method": "GET"}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                kind: "http_fetch",
                field: "url"
            }
        );
        assert!(fetcher().validate(&cfg(json!({"url": ""}))).is_err());
        assert!(fetcher()
            .validate(&cfg(json!({"url": "http://x", "response_path": "$.a"})))
            .is_ok());
    }

    #[test]
    fn validate_checks_list_shapes() {
        let f = fetcher();
        assert!(f
            .validate(&cfg(json!({"url": "http://x", "headers": {"k": "v"}})))
            .is_err());
        assert!(f
            .validate(&cfg(json!({"url": "http://x", "data_points": [{"variable": "t"}]})))
            .is_err());
        assert!(f
            .validate(&cfg(json!({
                "url": "http://x",
                "headers": [{"key": "X-A", "value": "1"}],
                "params": [{"key": "q", "value": 2}],
                "data_points": [{"response_path": "$.a"}]
            })))
            .is_ok());
    }

    #[test]
    fn key_value_pairs_keep_order_and_render_scalars() {
        let pairs = key_value_pairs(Some(&json!([
            {"key": "b", "value": "2"},
            {"key": "a", "value": 1},
            {"value": "orphan"},
            {"key": "c", "value": true}
        ])));
        assert_eq!(
            pairs,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
                ("c".to_string(), "true".to_string()),
            ]
        );
    }
}
