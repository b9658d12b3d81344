//! `pkgindexd`: a concurrent, in-memory package dependency index served over a line-oriented TCP
//! protocol.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pkgindex::admin;
use pkgindex::config::{Config, Opts};
use pkgindex::engine::Engine;
use pkgindex::metrics::Metrics;
use pkgindex::server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();

    init_logging(opts.quiet);

    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = Config::load(&opts).await?;
    let server_config = config.server;

    info!(version = %pkgindex::build::short(), "starting pkgindexd");

    let engine = Arc::new(Engine::new());
    let metrics = Arc::new(Metrics::new());

    let server = Arc::new(Server::new(
        Arc::clone(&engine),
        Arc::clone(&metrics),
        server_config.read_timeout(),
        server_config.shutdown_timeout(),
    ));

    if let Some(admin_addr) = server_config.admin_addr()? {
        let admin_state = admin::AdminState::new(
            Arc::clone(&engine),
            Arc::clone(&metrics),
            server.ready(),
        );
        let router = admin::router(admin_state);
        let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;
        info!(%admin_addr, "admin surface listening");
        tokio::spawn(async move {
            if let Err(err) = axum::serve(admin_listener, router).await {
                error!(error = %err, "admin surface exited with an error");
            }
        });
    }

    let listen_addr = server_config.listen_addr()?;

    let mut server_task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start(listen_addr).await })
    };

    tokio::select! {
        result = &mut server_task => {
            // the accept loop exited on its own, most likely a bind failure; nothing to drain
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(err.into()),
                Err(join_err) => Err(join_err.into()),
            };
        }
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received, draining connections");
        }
    }

    server.shutdown().await?;

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(err.into()),
        Err(join_err) => return Err(join_err.into()),
    }

    info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
