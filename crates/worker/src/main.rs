//! `viewline-worker`: rolling baseline engine process.
//!
//! See [`viewline_worker::config::WorkerConfig`] for the environment
//! variables it reads and [`viewline_worker::cli::Cli`] for subcommands.

use anyhow::Context;
use clap::Parser;
use viewline_worker::cli::Cli;
use viewline_worker::config::WorkerConfig;
use viewline_worker::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    telemetry::init(config.log_format);

    let pool = viewline_db::create_pool_with(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    viewline_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!(max_connections = config.max_connections, "Database connection established");

    cli.execute(config, pool, shutdown_signal())
        .await
        .context("Worker command failed")?;

    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
///
/// If a handler cannot be installed, that signal source is ignored and the
/// other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
