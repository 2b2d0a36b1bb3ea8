//! dvb-exporter: Prometheus exporter for DVB adapter signal quality.
//!
//! Every frontend under the DVB root is polled on a fixed interval and the
//! latest readings are served as gauges over HTTP.

use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::sync::watch;

mod collector;
mod config;
mod logging;
mod metrics;
mod web;

use collector::{Adapter, CollectionScheduler, Normalizer, ReadingStore};
use config::{Args, ConfigFile, ExporterConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > none
    let file_config = match config::load_config(args.config.as_deref()) {
        Ok(Some((path, file))) => {
            eprintln!("Loaded config from: {}", path.display());
            file
        }
        Ok(None) => ConfigFile::default(),
        Err(e) => {
            eprintln!("Failed to load config file: {}", e);
            return Err(e.into());
        }
    };
    let config = ExporterConfig::resolve(&args, file_config)?;

    logging::init_logging(
        &config.logging.log_dir,
        config.logging.retention_days,
        config.logging.verbose,
        config.logging.level.as_deref(),
    )?;

    info!("Starting DVB metrics exporter (Version: {})", env!("CARGO_PKG_VERSION"));
    config.warn_invalid_entries();
    let interval = config.collect_interval();
    info!("  Listen address: {}", config.listen);
    info!("  Telemetry path: {}", config.telemetry_path);
    info!("  Collect interval: {:?}", interval);
    info!("  SNR correction: {}", config.snr_correction);
    info!("  Strategy: {:?}", config.strategy);
    info!("  DVB root: {}", config.dvb_root.display());
    if !config.ignored_adapters.is_empty() {
        info!("  Ignored adapters: {:?}", config.ignored_adapters);
    }

    let discovered = match dvb_frontend::discover_frontends(&config.dvb_root, &config.ignored_adapters) {
        Ok(discovered) => discovered,
        Err(e) => {
            error!("Failed to discover frontends: {}", e);
            return Err(e.into());
        }
    };

    let adapters: Vec<Adapter> = discovered
        .into_iter()
        .map(|found| Adapter::new(found.id, found.path, found.device))
        .collect();
    for adapter in &adapters {
        info!("  {} ({})", adapter.id(), adapter.path().display());
    }

    let store = Arc::new(ReadingStore::new());
    let scheduler = CollectionScheduler::new(
        adapters,
        Normalizer::new(config.strategy, config.snr_correction),
        interval,
        Arc::clone(&store),
    );
    info!("Polling {} frontend(s)", scheduler.adapter_count());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let collector = tokio::spawn(scheduler.run(shutdown_rx));

    let served = web::start_web_server(
        config.listen,
        &config.telemetry_path,
        Arc::clone(&store),
        shutdown_signal(),
    )
    .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = collector.await {
        error!("Collection scheduler failed: {}", e);
    }

    match served {
        Ok(()) => {
            info!("DVB metrics exporter stopped");
            Ok(())
        }
        Err(e) => {
            error!("Web server error: {}", e);
            Err(e)
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
