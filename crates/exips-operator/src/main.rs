//! exips Operator
//!
//! Publishes the external IPs of ready, schedulable nodes on a Service.

use anyhow::anyhow;
use clap::Parser;
use exips_operator::{
    config::{Cli, Commands, Config, TargetArgs},
    observability::init_logging,
    publish::{service_manifest, KubeServicePublisher},
    watch::{sync_gate, WatchFeeder},
    Reconciler, Registry,
};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Api;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest(target) => print_manifest(&target),
        Commands::Run(args) => run_operator(Config::try_from(args)?).await,
    }
}

fn print_manifest(target: &TargetArgs) -> anyhow::Result<()> {
    let svc = service_manifest(&target.service_name, &target.namespace, Vec::new());
    println!("---");
    println!("{}", serde_yaml::to_string(&svc)?);
    Ok(())
}

async fn run_operator(config: Config) -> anyhow::Result<()> {
    init_logging(&config.logging).map_err(|e| anyhow!(e))?;

    info!(
        service_name = %config.target.name,
        namespace = %config.target.namespace,
        kubeconfig = ?config.kubeconfig,
        interval = ?config.interval,
        resync = ?config.resync,
        "Starting exips-operator"
    );

    let client = config.client().await?;
    info!("Connected to Kubernetes");

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(token.clone()));

    let registry = Arc::new(Registry::new());
    let (gate, mut synced) = sync_gate();
    let nodes: Api<Node> = Api::all(client.clone());
    let feeder = WatchFeeder::new(
        registry.clone(),
        move || watcher(nodes.clone(), watcher::Config::default()).default_backoff(),
        config.resync,
        gate,
    );
    let watch_task = tokio::spawn(feeder.run(token.clone()));

    if synced.wait().await.is_err() {
        // The feeder stopped before the first full listing: either shutdown
        // or a fatal watch error.
        watch_task.await??;
        info!("Shutdown before initial sync");
        return Ok(());
    }

    let reconciler = Reconciler::new(
        registry,
        KubeServicePublisher::new(client),
        config.target.clone(),
        config.interval,
    );
    let reconcile_task = tokio::spawn(reconciler.run(token.clone()));

    let watch_result = watch_task.await?;
    token.cancel();
    reconcile_task.await?;
    watch_result?;

    info!("exips-operator stopped");
    Ok(())
}

async fn cancel_on_signal(token: CancellationToken) {
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, listening for SIGINT only");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for SIGINT");
                return;
            }
            info!("Received SIGINT");
        }
    }
    token.cancel();
}
