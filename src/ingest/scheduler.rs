// src/ingest/scheduler.rs
//! One independent periodic worker per source definition.
//!
//! Each worker owns its ticker and its definition; the only shared state is
//! the [`Publisher`]. Workers run a cycle immediately, then every
//! `frequency`, until the shutdown token is cancelled. A cycle that is
//! already running when shutdown starts is allowed to finish.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{CapabilityError, ValidationError};
use crate::ingest::ensure_metrics_described;
use crate::ingest::handlers::{DynHandler, Handler, HandlerRegistry};
use crate::ingest::types::{HandlerConfig, SourceDefinition};
use crate::publish::Publisher;

/// Why a source was not started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("frequency must be positive")]
    ZeroFrequency,
}

/// Result of a single fetch-then-publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published(usize),
    Empty,
    FetchFailed,
    PublishFailed,
}

pub struct Scheduler {
    registry: HandlerRegistry,
    publisher: Arc<Publisher>,
    shutdown: CancellationToken,
    tasks: JoinSet<()>,
}

impl Scheduler {
    pub fn new(registry: HandlerRegistry, publisher: Arc<Publisher>) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            publisher,
            shutdown: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Token observed by every worker. Cancelling it stops the schedule.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of workers still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Resolve and validate the capability for `def`, then start its worker.
    pub fn spawn(&mut self, def: SourceDefinition) -> Result<(), StartError> {
        let handler = prepare(&self.registry, &def)?;
        info!(
            source = %def.name,
            kind = %def.kind,
            category = %def.category,
            frequency = ?def.frequency,
            "starting worker"
        );
        let publisher = Arc::clone(&self.publisher);
        let token = self.shutdown.child_token();
        self.tasks
            .spawn(run_worker(def, handler, publisher, token));
        Ok(())
    }

    /// Start a worker for each definition. Sources that fail to start are
    /// logged and skipped for the rest of the run. Returns the number started.
    pub fn spawn_all(&mut self, defs: impl IntoIterator<Item = SourceDefinition>) -> usize {
        let mut started = 0;
        for def in defs {
            let name = def.name.clone();
            match self.spawn(def) {
                Ok(()) => started += 1,
                Err(e) => {
                    error!(source = %name, error = %e, "source disabled for this run");
                    counter!("ingest_sources_disabled_total").increment(1);
                }
            }
        }
        started
    }

    /// Stop scheduling new cycles and wait for every worker to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "worker ended abnormally");
            }
        }
    }
}

/// Capability resolution and validation, before any I/O.
pub fn prepare(registry: &HandlerRegistry, def: &SourceDefinition) -> Result<DynHandler, StartError> {
    if def.frequency.is_zero() {
        return Err(StartError::ZeroFrequency);
    }
    let handler = registry.resolve(&def.kind)?;
    handler.validate(&HandlerConfig::for_source(def))?;
    Ok(handler)
}

async fn run_worker(
    def: SourceDefinition,
    handler: DynHandler,
    publisher: Arc<Publisher>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(def.frequency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let config = HandlerConfig::for_source(&def);
        run_cycle(&def.name, handler.as_ref(), &config, &publisher).await;
    }

    info!(source = %def.name, "worker stopped");
}

/// One fetch-then-publish cycle. Errors are logged, never propagated.
pub async fn run_cycle(
    source: &str,
    handler: &dyn Handler,
    config: &HandlerConfig,
    publisher: &Publisher,
) -> CycleOutcome {
    counter!("ingest_ticks_total", "source" => source.to_string()).increment(1);
    debug!(source, "fetching data");

    let points = match handler.fetch(config).await {
        Ok(points) => points,
        Err(e) => {
            warn!(source, error = %e, "fetch failed");
            counter!("ingest_fetch_errors_total", "source" => source.to_string()).increment(1);
            return CycleOutcome::FetchFailed;
        }
    };

    if points.is_empty() {
        info!(source, "no data points received");
        counter!("ingest_empty_total", "source" => source.to_string()).increment(1);
        return CycleOutcome::Empty;
    }

    counter!("ingest_points_total", "source" => source.to_string())
        .increment(points.len() as u64);
    info!(source, points = points.len(), "fetched data points");
    for p in &points {
        debug!(
            source = %p.source,
            category = %p.category,
            variable = %p.variable,
            value = p.value,
            units = %p.units,
            lat = p.lat,
            lon = p.lon,
            "data point"
        );
    }

    match publisher.publish(&points).await {
        Ok(()) => {
            info!(source, points = points.len(), "published");
            CycleOutcome::Published(points.len())
        }
        Err(e) => {
            error!(source, error = %e, "publish failed");
            CycleOutcome::PublishFailed
        }
    }
}
