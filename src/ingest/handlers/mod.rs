// src/ingest/handlers/mod.rs
//! Extraction capabilities, keyed by the source `type` string.
//!
//! ```text
//! "http_fetch"   ──► HttpFetcher
//! "web_scraper"  ──► not implemented
//! "ftp_download" ──► not implemented
//! anything else  ──► CapabilityError::Unknown
//! ```
//!
//! Resolution happens before any I/O, so an unknown or unimplemented type
//! disables its source before the first tick.

pub mod http_fetch;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CapabilityError, FetchError, ValidationError};
use crate::ingest::types::{DataPoint, HandlerConfig};

pub use http_fetch::HttpFetcher;

pub const HTTP_FETCH: &str = "http_fetch";
pub const WEB_SCRAPER: &str = "web_scraper";
pub const FTP_DOWNLOAD: &str = "ftp_download";

/// Fetch/validate behaviour for one source type.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Type string this handler serves (for logging).
    fn name(&self) -> &'static str;

    /// Check the type-specific config once, before the worker starts.
    fn validate(&self, config: &HandlerConfig) -> Result<(), ValidationError>;

    /// Run one fetch-and-extract cycle.
    async fn fetch(&self, config: &HandlerConfig) -> Result<Vec<DataPoint>, FetchError>;
}

pub type DynHandler = Arc<dyn Handler>;

/// Builds a handler instance for a type string.
pub type HandlerFactory = Arc<dyn Fn() -> Result<DynHandler, CapabilityError> + Send + Sync>;

/// Maps type strings to handler factories.
#[derive(Clone)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// Empty registry with no capabilities.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in capabilities.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register(HTTP_FETCH, || {
            HttpFetcher::new().map(|h| Arc::new(h) as DynHandler)
        });
        reg.register(WEB_SCRAPER, || {
            Err(CapabilityError::NotImplemented(WEB_SCRAPER.to_string()))
        });
        reg.register(FTP_DOWNLOAD, || {
            Err(CapabilityError::NotImplemented(FTP_DOWNLOAD.to_string()))
        });
        reg
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<DynHandler, CapabilityError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    /// Resolve a handler for `kind`.
    pub fn resolve(&self, kind: &str) -> Result<DynHandler, CapabilityError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| CapabilityError::Unknown(kind.to_string()))?;
        factory()
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
