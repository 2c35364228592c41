//! Data Ingestor: binary entrypoint.
//! Loads source definitions, starts one worker per source and publishes
//! extracted points to Kafka until SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use data_ingestor::config::{LogFormat, RuntimeConfig};
use data_ingestor::ingest::{config as sources, HandlerRegistry, Scheduler};
use data_ingestor::metrics::Metrics;
use data_ingestor::publish::{KafkaBus, MessageBus, Publisher};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("data_ingestor=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cfg = RuntimeConfig::from_env()?;
    init_tracing(cfg.log_format);
    info!("starting data ingestor");

    let defs = sources::load(&cfg.sources_dir)
        .with_context(|| format!("failed to load source configs from {}", cfg.sources_dir.display()))?;
    if defs.is_empty() {
        bail!("no source configurations found in {}", cfg.sources_dir.display());
    }
    info!(count = defs.len(), dir = %cfg.sources_dir.display(), "loaded source configurations");

    let metrics_shutdown = CancellationToken::new();
    if let Some(addr) = cfg.metrics_addr {
        let metrics = Metrics::init()?;
        let token = metrics_shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(addr, token).await {
                warn!(error = %e, "metrics endpoint unavailable");
            }
        });
    }

    let bus: Arc<dyn MessageBus> = Arc::new(KafkaBus::new(&cfg.bus)?);
    let publisher = Arc::new(Publisher::new(bus, cfg.bus.topic.clone()));

    let mut scheduler = Scheduler::new(HandlerRegistry::with_builtins(), Arc::clone(&publisher));
    let started = scheduler.spawn_all(defs);
    info!(started, topic = %publisher.topic(), brokers = ?cfg.bus.brokers, "data ingestor started");
    if started == 0 {
        warn!("no source could be started; waiting for shutdown signal");
    }

    wait_for_signal().await;
    info!("shutting down gracefully");

    scheduler.shutdown().await;
    if let Err(e) = publisher.flush().await {
        warn!(error = %e, "flush on shutdown failed");
    }
    metrics_shutdown.cancel();

    info!("stopped");
    Ok(())
}
