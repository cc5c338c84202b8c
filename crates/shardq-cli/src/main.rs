//! shardq - host-partitioned time-series query runner
//!
//! Usage:
//!   # Connection settings from the environment
//!   DB_USER=postgres DB_NAME=homework shardq -q query_params.csv -n 4
//!
//!   # Everything on the command line
//!   shardq -q query_params.csv -n 8 \
//!     --db-host tsdb --db-user postgres --db-name homework \
//!     --window-secs 60 --query-timeout-ms 5000 --on-query-error abort-task \
//!     -o results.jsonl

use clap::Parser;
use shardq_cli::{exit_code, report, Cli, EXIT_CANCELLED};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    #[cfg(feature = "prometheus")]
    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = shardq_core::metrics::init_metrics(addr) {
            tracing::warn!("Failed to start metrics exporter on {}: {}", addr, e);
        }
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received, cancelling run...");
        signal_cancel.cancel();
    });

    match shardq_cli::run(&cli, cancel.clone()).await {
        Ok(run) => {
            println!("{}", report::render_summary(&run, &cli.output));
            if cancel.is_cancelled() {
                std::process::exit(EXIT_CANCELLED);
            }
        }
        Err(e) if exit_code(&e) == EXIT_CANCELLED => {
            eprintln!("Run cancelled before any query was dispatched");
            std::process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}
