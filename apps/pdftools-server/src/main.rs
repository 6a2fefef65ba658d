//! PDF Tools Server
//!
//! Accepts file uploads and runs PDF tools on them as background jobs.
//! Provides REST API endpoints for:
//!
//! - File upload, download and deletion
//! - Job creation for 27 named operations (merge, split, convert, ...)
//! - Job status polling
//!
//! ## Architecture
//!
//! Creating a job returns immediately with a `pending` job id. A dispatcher
//! task pulls queued jobs and runs the CPU-bound PDF work on blocking worker
//! threads, writing results back to the file registry. Clients poll
//! `GET /api/jobs/:id` until the job reaches `completed` or `failed`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod error;
mod jobs;
mod polling;
mod registry;
mod storage;
#[cfg(test)]
mod tests;

use api::{
    handle_delete_file, handle_delete_job, handle_download, handle_get_file, handle_get_job,
    handle_health, handle_list_files, handle_list_jobs, handle_list_operations, handle_process,
    handle_upload,
};
use config::ServerConfig;
use jobs::{JobManager, JobStore};
use polling::PollingPolicy;
use registry::FileRegistry;
use storage::DiskStorage;

/// Command-line arguments for the PDF tools server
#[derive(Parser, Debug)]
#[command(name = "pdftools-server")]
#[command(about = "PDF tools server with asynchronous document jobs")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for uploaded files
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for files produced by jobs
    #[arg(long, env = "OUTPUT_DIR", default_value = "uploads/processed")]
    output_dir: PathBuf,

    /// Maximum number of jobs executing at once
    #[arg(long, env = "JOB_WORKERS", default_value = "4")]
    workers: usize,

    /// Jobs that may wait in the queue
    #[arg(long, env = "JOB_QUEUE_CAPACITY", default_value = "1000")]
    queue_capacity: usize,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "RATE_LIMIT", default_value = "20")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<FileRegistry>,
    pub jobs: Arc<JobStore>,
    pub manager: JobManager,
    pub polling: PollingPolicy,
}

impl AppState {
    /// Wire up storage, registry and the job manager. Must be called from
    /// inside a Tokio runtime since it spawns the job dispatcher.
    pub fn new(config: ServerConfig) -> Self {
        let storage = Arc::new(DiskStorage::new(&config));
        let registry = Arc::new(FileRegistry::new(storage));
        let jobs = Arc::new(JobStore::new());
        let manager = JobManager::start(
            Arc::clone(&jobs),
            Arc::clone(&registry),
            config.workers,
            config.queue_capacity,
        );
        Self {
            polling: PollingPolicy::new(config.poll_interval),
            config: Arc::new(config),
            registry,
            jobs,
            manager,
        }
    }
}

/// Build the application router without rate limiting.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Files
        .route("/api/upload", post(handle_upload))
        .route("/api/files", get(handle_list_files))
        .route("/api/files/:id", get(handle_get_file).delete(handle_delete_file))
        .route("/api/files/:id/download", get(handle_download))
        // Jobs
        .route("/api/process", post(handle_process))
        .route("/api/jobs", get(handle_list_jobs))
        .route("/api/jobs/:id", get(handle_get_job).delete(handle_delete_job))
        .route("/api/operations", get(handle_list_operations))
        // Apply middleware
        .layer(DefaultBodyLimit::max(state.config.body_limit()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PDF tools server on {}:{}", args.host, args.port);

    let mut config = ServerConfig::new(args.upload_dir, args.output_dir);
    config.workers = args.workers;
    config.queue_capacity = args.queue_capacity;

    let state = AppState::new(config);
    state.registry.storage().ensure_dirs().await?;

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit.saturating_mul(2))
            .finish()
            .ok_or_else(|| anyhow!("Invalid rate limit: {}", args.rate_limit))?,
    );

    let app = build_router(state.clone()).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!(
        "Job workers: {}, queue capacity: {}, poll interval: {:?}",
        state.config.workers,
        state.config.queue_capacity,
        state.polling.interval
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
