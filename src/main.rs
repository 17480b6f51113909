//! Xylem
//!
//! Provisioning service for GlusterFS volumes and PostgreSQL databases.
//! Loads the YAML configuration, prepares the database registry, starts the
//! Marathon group sync when configured and serves the REST API until
//! interrupted.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use xylem::{ApiServer, ApiServerConfig, Error, MarathonSync, Orchestrator, Result, XylemConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Xylem - Volume and database provisioning for container workloads
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, env = "XYLEM_CONFIG", default_value = "/etc/xylem/xylem.yml")]
    config: PathBuf,

    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting Xylem");
    info!("  Version: {}", xylem::VERSION);
    info!("  Config: {}", args.config.display());
    info!("  REST API: {}", args.api_addr);

    let config = XylemConfig::from_file(&args.config)?;

    let orchestrator = Orchestrator::from_config(&config)?;
    orchestrator.initialize().await?;
    info!("Orchestrator initialized");

    let cancel = CancellationToken::new();

    let sync_handle = match config.marathon.clone() {
        Some(marathon) => {
            let sync = Arc::new(MarathonSync::new(marathon)?);
            let cancel = cancel.clone();
            Some(tokio::spawn(async move { sync.run(cancel).await }))
        }
        None => None,
    };

    let api_config = ApiServerConfig {
        rest_addr: args
            .api_addr
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid REST API address: {}", e)))?,
    };
    let api_server = ApiServer::new(api_config, orchestrator.clone());

    let shutdown = api_server.shutdown_handle();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, shutting down"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        signal_cancel.cancel();
        let _ = shutdown.send(());
    });

    let served = api_server.run().await;

    cancel.cancel();
    if let Some(handle) = sync_handle {
        if let Err(e) = handle.await {
            error!("Marathon sync task failed: {}", e);
        }
    }

    served?;
    info!("Xylem shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let directive = |s: &str| -> Result<Directive> {
        s.parse()
            .map_err(|e| Error::Configuration(format!("Invalid log directive {}: {}", s, e)))
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("sqlx=warn")?)
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("tower_http=info")?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
