mod api;
mod archive_worker;
mod config;
mod error;
mod jobs;
mod live_worker;
mod persistence;
mod upstream;

use std::sync::Arc;

use live_worker::{LiveWorker, LiveWorkerDeps};

use crate::jobs::{JobManager, Worker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!("Starting puzzle mining server");

    let config = config::Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "fatal configuration error");
        e
    })?;

    let store = persistence::SqlitePuzzleStore::open(&config.database_path)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "fatal store error");
            e
        })?;
    let repo = Arc::new(store);

    let client = reqwest::Client::new();
    let jobs = Arc::new(JobManager::new());

    let live_worker = LiveWorker::new(LiveWorkerDeps {
        repo: repo.clone(),
        client: client.clone(),
        live_url: config.upstream_live_url.clone(),
        engine_path: config.engine_path.clone(),
        engine_args: config.engine_args.clone(),
        multi_pv: config.multi_pv,
        max_depth: config.max_depth,
        min_puzzle_mate_distance: config.min_puzzle_mate_distance,
    });
    live_worker.start();

    let state = api::AppState {
        repo,
        jobs,
        client,
        archive_base_url: config.upstream_archive_base_url.clone(),
        engine_path: config.engine_path.clone(),
        engine_args: config.engine_args.clone(),
        multi_pv: config.multi_pv,
        max_depth: config.max_depth,
        min_puzzle_mate_distance: config.min_puzzle_mate_distance,
        archive_slots: Arc::new(tokio::sync::Semaphore::new(config.archive_worker_count)),
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let server = axum::serve(listener, api::router(state));

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("server error: {}", e);
            }
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down gracefully");
        }
        _ = sigint.recv() => {
            tracing::info!("received SIGINT, shutting down gracefully");
        }
    }

    tracing::info!("server shut down");
    Ok(())
}
