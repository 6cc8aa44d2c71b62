// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AVAL Ledger Node
//!
//! Entry point for the `aval-node` binary. Parses CLI arguments, initializes
//! logging and metrics, constructs the staking ledger, and serves the HTTP
//! API.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the ledger node
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::signal;

use aval_ledger::asset::AssetKind;
use aval_ledger::clock::SystemClock;
use aval_ledger::directory::{InMemoryDirectory, RecordingOutlet};
use aval_ledger::registry::VouchRegistry;

use cli::{AvalNodeCli, Commands};
use logging::LogFormat;
use metrics::LedgerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AvalNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the ledger node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "aval_node=info,aval_ledger=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        fee_recipient = %args.fee_recipient,
        "starting aval-node"
    );

    // --- Collaborators ---
    // The in-memory directory doubles as the runtime registration surface
    // (POST /profiles); the recording outlet is the in-process settlement
    // journal. A production deployment swaps both for real subsystems.
    let directory = InMemoryDirectory::new();
    let outlet = RecordingOutlet::new();

    // --- Ledger ---
    let registry = VouchRegistry::new(
        AssetKind::Native,
        args.fee_recipient.clone(),
        directory.clone(),
        outlet,
        SystemClock,
    );

    // --- Metrics ---
    let ledger_metrics = Arc::new(LedgerMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (ledger {})",
            env!("CARGO_PKG_VERSION"),
            aval_ledger::config::PROTOCOL_VERSION,
        ),
        registry: Arc::new(RwLock::new(registry)),
        directory,
        metrics: Arc::clone(&ledger_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind_addr, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&ledger_metrics));
    let metrics_addr = format!("{}:{}", args.bind_addr, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("aval-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("aval-node {}", env!("CARGO_PKG_VERSION"));
    println!("ledger    {}", aval_ledger::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
