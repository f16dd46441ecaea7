//! OAC API Server
//!
//! Serves Open Astronomy Catalog queries over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use oac_api::app::build_router;
use oac_api::config::ApiConfig;
use oac_api::state::AppState;

/// OAC API Server
#[derive(Parser, Debug)]
#[command(name = "oac-api")]
#[command(about = "Open Astronomy Catalog query server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5000", env = "OAC_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Service configuration file
    #[arg(short, long, default_value = "config/oac.yaml", env = "OAC_CONFIG")]
    config: PathBuf,

    /// Catalog data directory (overrides the config file)
    #[arg(long, env = "OAC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Number of worker threads
    #[arg(long, env = "OAC_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;
    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting OAC API server");

    let mut config = ApiConfig::load_from_file(&args.config)?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    info!(data_dir = %config.data_dir.display(), "Using catalog data directory");

    let state = Arc::new(AppState::new(config));

    // Serve 503s until a load succeeds rather than refusing to start
    if let Err(e) = state.reload().await {
        tracing::error!("Initial catalog load failed: {:#}", e);
    }

    let app = build_router(state, Some(prometheus_handle));

    // Parse listen address
    let addr: SocketAddr = args.listen.parse().context("Invalid listen address")?;

    info!("OAC API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
