#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use hashq::WorkCoordinator;
use server::config::{CliArgs, ServerConfig};
use server::service::handler::{AppState, router};
use server::telemetry::{MetricsObserver, init_telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let coordinator = Arc::new(
        WorkCoordinator::builder()
            .delay(config.delay)
            .shards(config.store_shards)
            .observer(MetricsObserver)
            .build(),
    );
    let state = AppState::new(Arc::clone(&coordinator));

    let listener = TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&listener.local_addr()?, &config);

    // Stop accepting connections as soon as draining begins; in-flight
    // requests are allowed to finish.
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    // 1. The listener is closed, wait for the background units
    #[cfg(feature = "tracing")]
    tracing::info!(
        "HTTP server stopped, waiting on {} outstanding units",
        coordinator.outstanding()
    );
    coordinator.shutdown().await;

    // 2. Flush telemetry
    providers.shutdown();

    #[cfg(feature = "tracing")]
    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(_addr: &SocketAddr, _config: &ServerConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting hash service on {} with full config: {:#?}",
            _addr,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting hash service on {} with a {:?} processing delay",
            _addr,
            _config.delay
        );
    }
}

/// Resolves when SIGINT, SIGTERM or `/shutdown` asks the service to stop.
/// Every path ends with draining started, so no new work is admitted.
async fn shutdown_signal(state: AppState) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to install SIGTERM handler: {_e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to install Ctrl+C handler: {_e}");
            std::future::pending::<()>().await;
        }
    };

    let draining = state.coordinator().drain().draining_token();

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
        () = draining.cancelled() => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received shutdown request");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, terminating gracefully...");

    state.trigger_shutdown();
}
