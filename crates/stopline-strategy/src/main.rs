/*
[INPUT]:  CLI arguments, YAML configuration file, environment, OS shutdown signals
[OUTPUT]: Running exchange heartbeat and HTTP control server with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stopline_adapter::BitmexClient;
use stopline_strategy::{
    AppState, ServiceConfig, SystemClock, TaskContext, TaskController, create_router, server,
};

#[derive(Parser, Debug)]
#[command(name = "stopline", version, about = "BitMEX stop order automation service")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = match ServiceConfig::load(args.config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = ?err, "invalid configuration");
            return Err(err);
        }
    };
    info!(port = config.port, symbol = %config.symbol, stock = %config.stock, "configuration loaded");

    let client = Arc::new(
        BitmexClient::with_config(config.credentials(), config.client_config())
            .context("build exchange client")?,
    );

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let heartbeat = client.clone().spawn_heartbeat(shutdown.child_token());

    let ctx = TaskContext::new(client, Arc::new(SystemClock), config.timing());
    let controller = Arc::new(TaskController::new(ctx).with_status_delay(config.status_delay()));
    let router = create_router(AppState::new(controller, &config.password));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "control server started");

    server::serve(listener, router, shutdown.clone()).await?;
    info!("control server stopped");

    shutdown.cancel();
    if let Err(err) = heartbeat.await {
        warn!(error = %err, "heartbeat task ended abnormally");
    }
    info!("shutdown complete");

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
