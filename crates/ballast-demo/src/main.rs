#![doc = include_str!("../README.md")]

mod config;
mod demand;
mod report;
mod telemetry;

use ballast::Balancer;
use clap::Parser;
use config::{CliArgs, DemoConfig};
use std::time::Duration;
use telemetry::init_telemetry;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DemoConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let (balancer, intake) = Balancer::<Duration>::new(&config.pool);
    let snapshots = balancer.subscribe();
    let shutdown = CancellationToken::new();

    let coordinator = tokio::spawn(balancer.run(shutdown.clone()));
    let reporter = tokio::spawn(report::run(snapshots, config.report));
    let producers = demand::spawn(&intake, &config.demand, &shutdown);
    drop(intake);

    shutdown_signal(config.run_for).await;
    tracing::info!("Shutdown signal received, draining in-flight work...");
    shutdown.cancel();

    let summary = coordinator.await??;

    let mut served = 0;
    for result in futures::future::join_all(producers).await {
        match result {
            Ok(count) => served += count,
            Err(e) => tracing::error!("Producer failed: {e}"),
        }
    }
    reporter.await?;

    tracing::info!(
        "Stopped: {} dispatched, {} completed, {} answered to producers",
        summary.dispatched,
        summary.completed,
        served
    );
    Ok(())
}

fn log_startup_info(config: &DemoConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting demo with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting demo with {} workers and {} producers",
            config.pool.workers(),
            config.demand.producers
        );
    }
}

/// Resolves on Ctrl+C, SIGTERM or once `run_for` has elapsed.
async fn shutdown_signal(run_for: Option<Duration>) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let deadline = async {
        match run_for {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = deadline => tracing::info!("Run time elapsed"),
    }
}
