// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use kube::{Client, ResourceExt};
use loadbalancer_provider::{
    config::Configuration,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    informer::{spawn_informers, ObjectEvent},
    metrics, provider,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("lb-provider")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting LoadBalancer provider controller");

    let config = Configuration::parse();
    debug!(?config, "Configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let (stores, hub) = spawn_informers(&client);
    let ctx = Arc::new(Context {
        client,
        stores,
    });

    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(err) = metrics::serve_metrics(metrics_port).await {
            error!(error = %err, "Metrics server exited");
        }
    });

    // Wire every registered provider before any of them starts processing.
    let registry = provider::registry();
    for plugin in registry.plugins() {
        plugin.init(&config, Arc::clone(&ctx), &hub);
    }

    // Umbrella event loop: LoadBalancer changes fan out to all providers,
    // which each decide whether the object concerns them.
    let mut lb_rx = hub.loadbalancers.subscribe();
    tokio::spawn(async move {
        loop {
            match lb_rx.recv().await {
                Ok(ObjectEvent::Applied(lb) | ObjectEvent::Deleted(lb)) => {
                    debug!(lb = %lb.name_any(), "LoadBalancer event");
                    for plugin in provider::registry().plugins() {
                        plugin.on_sync(&lb);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "LoadBalancer event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received, draining providers");
        let _ = stop_tx.send(true);
    });

    info!("Starting all providers");
    let runs = registry
        .plugins()
        .map(|plugin| plugin.run(stop_rx.clone()))
        .collect::<Vec<_>>();
    futures::stream::iter(runs)
        .for_each_concurrent(None, |run| run)
        .await;

    info!("All providers stopped");
    Ok(())
}
