//! Binary entrypoint for the userdb processes.
//!
//! `userdb-server engine` runs the datagram backend that owns the account
//! store; `userdb-server frontend` runs the connection-accepting relay.
//! Configuration comes from `--config <file.json>` and `USERDB_*` variables
//! (see `userdb_server::config`).

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use userdb_server::config::{Config, EngineConfig, FrontendConfig};
use userdb_server::engine::RequestEngine;
use userdb_server::error::ServerError;
use userdb_server::frontend::Frontend;
use userdb_server::server::EngineServer;
use userdb_server::state::AppState;

/// userdb account service.
#[derive(Parser)]
#[command(name = "userdb-server", about = "userdb account service")]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available processes.
#[derive(Subcommand)]
enum Commands {
    /// Run the datagram engine that owns the account store.
    Engine,
    /// Run the front end that relays client connections to the engine.
    Frontend,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match Config::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Engine => run_engine(config.engine).await,
            Commands::Frontend => run_frontend(config.frontend).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "fatal");
        process::exit(1);
    }
}

async fn run_engine(config: EngineConfig) -> Result<(), ServerError> {
    let engine = RequestEngine::open(&config)?;
    let server = EngineServer::bind(&config.bind_addr, AppState::new(engine)).await?;
    server.serve(shutdown_signal()).await
}

async fn run_frontend(config: FrontendConfig) -> Result<(), ServerError> {
    let frontend = Frontend::bind(&config).await?;
    frontend.serve(shutdown_signal()).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
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
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
