//! CSI Topology
//!
//! Serves normalized CSI volume topology to dashboards.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use csi_topology::{
    init_logging, ApiServer, ClusterVolumeClient, ConfigWatcher, DiscoveryMetrics,
    EffectiveSettings, RestRouter, ServiceArgs, SettingsFile, SharedSettings, VolumeFinder,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServiceArgs::parse();

    let file = SettingsFile::load(&args.config_file)
        .with_context(|| format!("reading settings file {}", args.config_file.display()))?;
    let effective = EffectiveSettings::resolve(&args, file.as_ref());

    let log = init_logging(effective.log_level, effective.log_format)?;
    if let Err(e) = log.set_trace_export(&effective.traces) {
        error!(error = %e, "Tracing initialization failed");
    }

    info!("Starting CSI Topology");
    info!("  Version: {}", csi_topology::VERSION);
    info!("  Debug endpoints: {}", args.debug);
    if file.is_none() {
        warn!(
            file = %args.config_file.display(),
            "Settings file not found; using command line and environment only"
        );
    }

    let server_config = args.api_server_config()?;

    let settings = SharedSettings::new(effective.discovery);
    let metrics = DiscoveryMetrics::new()?;
    let client = Arc::new(ClusterVolumeClient::in_cluster());
    let finder = Arc::new(VolumeFinder::new(client, settings.clone(), metrics.clone()));

    let router = RestRouter::new(finder, settings.clone(), metrics)
        .with_debug(args.debug)
        .build();
    let server = Arc::new(ApiServer::new(server_config, router));

    let (shutdown_tx, _) = broadcast::channel(1);
    let watcher = ConfigWatcher::new(args.clone(), settings, Some(log.clone()), file);
    tokio::spawn(watcher.run(shutdown_tx.subscribe()));

    let running = server.clone();
    let mut server_task = tokio::spawn(async move { running.run().await });

    let result = tokio::select! {
        result = &mut server_task => {
            let _ = shutdown_tx.send(());
            result.context("API server task panicked")
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for shutdown signal")?;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
            server.shutdown();
            server_task.await.context("API server task panicked")
        }
    };

    log.shutdown();
    result??;

    info!("Shutdown complete");
    Ok(())
}
