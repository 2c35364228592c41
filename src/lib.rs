// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod publish;

// ---- Re-exports for stable public API ----
pub use crate::error::{CapabilityError, ConfigError, FetchError, PublishError, ValidationError};
pub use crate::ingest::{
    Category, CycleOutcome, DataPoint, Handler, HandlerConfig, HandlerRegistry, Scheduler,
    SourceDefinition,
};
pub use crate::publish::{MessageBus, OutboundMessage, Publisher};
