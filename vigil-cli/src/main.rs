mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vigil_core::{init_logging, spawn_sweeper, EventHub, LoggingConfig, SessionRegistry};
use vigil_http::{start_server, ServerConfig, ServerState};

use config::Config;

fn print_banner(config: &Config) {
    let separator = "════════════════════════════════════════════════";
    println!("{}", separator);
    println!("Address:        \x1b[1mhttp://localhost:{}\x1b[0m", config.port);
    println!("Log level:      \x1b[1m{}\x1b[0m", config.console_level());
    println!("Data directory: \x1b[1m{}\x1b[0m", config.data_dir.display());
    println!("{}", separator);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let hub = EventHub::new();
    let logging = LoggingConfig {
        console_level: config.console_level(),
        ..LoggingConfig::default()
    };
    init_logging(&logging, &hub).context("failed to initialize logging")?;

    print_banner(&config);

    let auth = config.resolve_auth_key();
    if auth.generated {
        // Printed rather than logged so the key never lands in the streamed history
        println!("Generated AUTH_KEY: \x1b[1m{}\x1b[0m\n", auth.key);
    }

    let (registry, count) = SessionRegistry::open(&config.data_dir)
        .await
        .context("failed to initialize session registry")?;
    info!(count, data_dir = %config.data_dir.display(), "sessions loaded");
    let sessions = Arc::new(registry);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(sessions.clone(), config.sweep_interval(), shutdown.clone());

    let state = ServerState::new(sessions, hub, auth.key);
    let server_shutdown = shutdown.clone();
    let result = start_server(ServerConfig::new(config.address()), state, async move {
        shutdown_signal().await;
        server_shutdown.cancel();
    })
    .await;

    shutdown.cancel();
    sweeper.await.context("session sweeper panicked")?;

    if let Err(e) = &result {
        error!(error = %e, "http server exited with error");
    }
    result
}
