//! NetCDF API Server
//!
//! Converts uploaded NetCDF files to JSON documents and grid record streams.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use netcdf_api::build_router;
use netcdf_api::config::ApiConfig;
use netcdf_api::state::AppState;

/// NetCDF API Server
#[derive(Parser, Debug)]
#[command(name = "netcdf-api")]
#[command(about = "Converts uploaded NetCDF files to JSON over HTTP")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8000", env = "NETCDF_API_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "NETCDF_API_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// Path to the YAML configuration file
    #[arg(
        short,
        long,
        default_value = "config/netcdf-api.yaml",
        env = "NETCDF_API_CONFIG"
    )]
    config: PathBuf,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

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
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    netcdf_parser::silence_hdf5_errors();

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    let config = ApiConfig::load(&args.config)?;
    info!(
        max_upload_mb = config.max_upload_mb,
        temp_dir = %config.temp_dir().display(),
        unpack_cf = config.unpack_cf,
        "Starting NetCDF API server"
    );

    let state = Arc::new(AppState::new(config).with_prometheus(prometheus_handle));
    let app = build_router(state);

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.listen))?;

    info!("NetCDF API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
