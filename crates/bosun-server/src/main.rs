//! bosun-server: single-host control-plane streaming daemon.
//!
//! Accepts WebSocket upgrades on one endpoint and multiplexes them by
//! path into live channels: host shell and container exec PTYs, container
//! log tails, ping output, and interval-pushed container/host telemetry.

mod config;
mod docker;
mod metrics;
mod router;
mod server;
mod session;

use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use config::ServerConfig;
use docker::DockerCli;
use router::RouteTable;
use server::StreamServer;
use session::{SessionContext, SessionRegistry};

/// bosun-server: host control-plane streaming daemon
#[derive(Parser, Debug)]
#[command(name = "bosun-server", version, about = "Host control-plane streaming daemon")]
struct Cli {
    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.bosun/config.toml")]
    config: String,

    /// Telemetry poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = match ServerConfig::load(
        Some(Path::new(&cli.config)),
        cli.port,
        cli.bind.as_deref(),
        cli.interval_ms,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let bind_addr: SocketAddr = match format!("{}:{}", config.bind, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(bind = %config.bind, port = config.port, error = %e, "invalid bind address");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %bind_addr,
        shell = %config.shell_program,
        interval_ms = config.poll_interval_ms,
        "starting bosun-server"
    );

    let shutdown = CancellationToken::new();
    let ctx = SessionContext {
        shell_program: config.shell_program,
        term: config.term,
        docker: DockerCli::new(config.docker_bin),
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        registry: SessionRegistry::new(),
        shutdown: shutdown.clone(),
    };

    let stream_server = match StreamServer::bind(bind_addr, RouteTable::new(), ctx).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = stream_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
            shutdown.cancel();
        }
    }

    info!("bosun-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
