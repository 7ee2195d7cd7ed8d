use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use poussetaches::config::EngineConfig;
use poussetaches::engine::Engine;
use poussetaches::{rest, workers};

#[derive(Parser)]
#[command(name = "poussetaches", about = "Push-mode task dispatcher", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Admission/query HTTP server port.
    #[arg(long, env = "POUSSETACHES_PORT")]
    port: Option<u16>,

    /// Base directory for the three bucket directories (waiting/success/dead).
    #[arg(long, env = "POUSSETACHES_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "POUSSETACHES_LOG")]
    log: Option<String>,

    /// Worker pool size.
    #[arg(long, env = "POUSSETACHES_WORKERS")]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the dispatcher (default when no subcommand is given).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log.clone().unwrap_or_else(|| "info".to_string());
    setup_logging(&log_level);

    match args.command {
        Some(Command::Serve) | None => {
            run_server(args.port, args.data_dir, args.log, args.workers).await
        }
    }
}

fn setup_logging(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .compact()
        .init();
}

async fn run_server(
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    log: Option<String>,
    worker_count: Option<usize>,
) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "poussetaches starting");

    let config = EngineConfig::new(port, data_dir, log, worker_count);
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        workers = config.workers,
        "config loaded"
    );
    if config.auth_key.is_none() {
        warn!("POUSSETACHES_AUTH_KEY is unset — callback requests will carry no auth header");
    }

    let engine = Arc::new(Engine::new(config.clone()));
    engine.boot_recover().await?;

    let worker_handles = workers::spawn_pool(engine.clone());

    let mut server = tokio::spawn({
        let engine = engine.clone();
        async move { rest::serve(engine, config.port).await }
    });

    tokio::select! {
        res = &mut server => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining workers");
            server.abort();
        }
    }

    engine.broadcast_shutdown();
    for handle in worker_handles {
        let _ = handle.await;
    }
    info!("poussetaches stopped");
    Ok(())
}
