//! `uidpool-server`: hands out durable, unique, monotonic 64-bit IDs over HTTP.
//!
//! ```bash
//! curl -X POST http://localhost:8080/uid
//! {"value":1}
//! ```
//!
//! See `--help` for configuration. Every option can also be set through the
//! environment or a `.env` file.

mod server;

use anyhow::Context;
use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::serve::serve;
use server::service::handler::IdService;
use server::telemetry::init_telemetry;
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

    // A store we cannot read or trust means uniqueness cannot be guaranteed,
    // so bail out before anything listens.
    let service = match IdService::new(&config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Refusing to start: {e}");
            providers.shutdown();
            return Err(e).context("failed to initialize the ID pool");
        }
    };

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&config);

    let res = serve(listener, service, config.shutdown_grace, shutdown_signal()).await;
    providers.shutdown();
    res
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting ID service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting ID service on {} with state file {}",
            config.server_addr,
            config.state_file.display()
        );
    }
}

async fn shutdown_signal() {
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

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
