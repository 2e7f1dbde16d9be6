//! # contact-watch
//!
//! Watches a contact directory and streams its changes to stdout.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        contact-watch                                    │
//! │                                                                         │
//! │  parse args ──► logging ──► load config ──► ensure_access ──┐          │
//! │                                                  (denied: exit 1)       │
//! │                                                             ▼          │
//! │            start(): fetch_all ──► Initial frame ──► subscribe          │
//! │                                  (failed: exit 1)           │          │
//! │                                                             ▼          │
//! │            --once ─────────────────────────────────► exit 0            │
//! │                                                             │          │
//! │            run loop ◄── wake-ups ◄── directory watcher      │          │
//! │                │                                                       │
//! │         SIGINT / SIGTERM ──► shutdown ──► grace period ──► exit 0      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cli;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use contact_sync::{ensure_access, ChangeCoordinator, DirectoryStore, SyncEmitter};

use crate::cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!("Starting contact-watch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = args.resolve_config().context("loading configuration")?;
    info!(
        store = %config.store.path.display(),
        poll_interval_ms = config.sync.poll_interval_ms,
        poll_fallback = config.sync.poll_fallback,
        pretty = config.output.pretty,
        "Configuration loaded"
    );

    // One authorization call before any cycle
    let store = Arc::new(DirectoryStore::new(
        &config.store.path,
        config.store.create_if_missing,
    ));
    ensure_access(&*store).await?;

    let emitter = Arc::new(SyncEmitter::stdout(config.output.pretty));
    let (mut coordinator, handle) = ChangeCoordinator::new(store, emitter, config.sync.clone());
    coordinator.start().await?;

    if args.once {
        info!("Initial snapshot written, exiting (--once)");
        return Ok(());
    }

    let mut task = tokio::spawn(coordinator.run());

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut task => {
            result.context("coordinator task failed")?;
            warn!("Coordinator stopped on its own");
            return Ok(());
        }
    }

    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "Shutdown request not delivered");
    }

    let grace = config.sync.shutdown_grace();
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(())) => info!("Shutdown complete"),
        Ok(Err(e)) => warn!(error = %e, "Coordinator task ended abnormally"),
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "Grace period elapsed, abandoning cycle");
            task.abort();
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
