// src/ingest/mod.rs
pub mod config;
pub mod env;
pub mod extract;
pub mod handlers;
pub mod jsonpath;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

pub use handlers::{Handler, HandlerRegistry};
pub use scheduler::{run_cycle, CycleOutcome, Scheduler};
pub use types::{Category, DataPoint, HandlerConfig, SourceDefinition};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_ticks_total", "Scheduler ticks per source.");
        describe_counter!(
            "ingest_fetch_errors_total",
            "Fetch/extract failures (tick skipped)."
        );
        describe_counter!("ingest_points_total", "Data points extracted.");
        describe_counter!("ingest_empty_total", "Ticks that produced no points.");
        describe_counter!(
            "ingest_fetch_bytes_total",
            "Response body bytes received by http_fetch."
        );
        describe_counter!(
            "ingest_sources_disabled_total",
            "Sources skipped at startup (unknown type or invalid config)."
        );
        describe_histogram!("ingest_fetch_ms", "HTTP fetch time in milliseconds.");
        describe_counter!("publish_messages_total", "Messages accepted by the bus.");
        describe_counter!(
            "publish_json_fallback_total",
            "Points encoded as JSON after the binary encoder failed."
        );
        describe_counter!("publish_errors_total", "Failed batch submissions.");
    });
}
