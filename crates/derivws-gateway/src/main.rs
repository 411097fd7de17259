/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: Running HTTP gateway, or one-shot JSON output for local testing
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use derivws_gateway::routes::ApiError;
use derivws_gateway::{AppState, GatewayConfig, create_router};

#[derive(Parser, Debug)]
#[command(name = "derivws-gateway", version, about = "HTTP gateway for Deriv WebSocket market data")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP endpoints (default)
    Serve {
        #[arg(long = "listen", value_name = "ADDR")]
        listen: Option<SocketAddr>,
    },
    /// Fetch the server time once and print the endpoint JSON
    Time,
    /// Fetch candle history once and print the endpoint JSON
    Candles {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        count: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = match &args.config_path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    let service = config.build_service()?;

    match args.command.unwrap_or(Command::Serve { listen: None }) {
        Command::Serve { listen } => {
            let listen = listen.unwrap_or(config.listen);
            let state = Arc::new(AppState::new(service, config.candles.clone()));
            serve(listen, state).await
        }
        Command::Time => {
            let body = match service.server_time().await {
                Ok(report) => serde_json::to_value(report)?,
                Err(err) => upstream_body(&err),
            };
            print_json(&body)
        }
        Command::Candles { symbol, count } => {
            let symbol = symbol.unwrap_or_else(|| config.candles.symbol.clone());
            let count = count.unwrap_or(config.candles.count);
            let body = match service.candle_history(&symbol, count).await {
                Ok(report) => serde_json::to_value(report)?,
                Err(err) => upstream_body(&err),
            };
            print_json(&body)
        }
    }
}

async fn serve(listen: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!(listen = %listen, "gateway listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;
    info!("gateway shutdown complete");
    Ok(())
}

fn upstream_body(err: &derivws_adapter::DerivError) -> serde_json::Value {
    warn!(error = %err, "request failed");
    ApiError::upstream(err).into_body()
}

fn print_json(body: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<GatewayConfig> {
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    GatewayConfig::from_file(path_str).context("load config")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
        info!("received SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received SIGTERM");
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
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
}
