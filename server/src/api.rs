//! HTTP control plane: serve a random puzzle near a rating, kick off an
//! archive-mining job for a user, and poll a job's status.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::archive_worker::{ArchiveWorker, ArchiveWorkerDeps};
use crate::error::AppError;
use crate::jobs::JobManager;
use crate::persistence::{PuzzleRepository, SqlitePuzzleStore};

/// `target_elo` is matched against a band this wide either side of the
/// requested rating.
const ELO_TOLERANCE: i32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<SqlitePuzzleStore>,
    pub jobs: Arc<JobManager>,
    pub client: reqwest::Client,
    pub archive_base_url: String,
    pub engine_path: String,
    pub engine_args: Vec<String>,
    pub multi_pv: u8,
    pub max_depth: u32,
    pub min_puzzle_mate_distance: i32,
    /// Bounds the number of archive jobs mining concurrently; sized from
    /// `ARCHIVE_WORKER_COUNT`. The live worker never touches this — it runs
    /// standalone, outside the job manager entirely.
    pub archive_slots: Arc<Semaphore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/task", get(get_task))
        .route("/task/{user}", get(start_archive_job))
        .route("/job/{id}", get(get_job))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    elo: i32,
}

async fn get_task(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, AppError> {
    let puzzle = state
        .repo
        .random_puzzle_near_elo(query.elo, ELO_TOLERANCE)
        .await
        .map_err(|_| AppError::Persistence)?
        .ok_or(AppError::PuzzleGeneration)?;
    Ok(Json(puzzle))
}

#[derive(Debug, Deserialize)]
struct ArchiveQuery {
    last: u32,
}

async fn start_archive_job(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(query): Query<ArchiveQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    if query.last == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let Ok(permit) = state.archive_slots.clone().try_acquire_owned() else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let worker = ArchiveWorker::new(
        ArchiveWorkerDeps {
            repo: state.repo.clone(),
            client: state.client.clone(),
            archive_base_url: state.archive_base_url.clone(),
            engine_path: state.engine_path.clone(),
            engine_args: state.engine_args.clone(),
            multi_pv: state.multi_pv,
            max_depth: state.max_depth,
            min_puzzle_mate_distance: state.min_puzzle_mate_distance,
            user,
            requested_games: query.last,
        },
        permit,
    );
    let job_id = state.jobs.start_job(worker).await;
    Ok(Json(serde_json::json!({ "job_id": job_id })))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.jobs.report(&id).await.ok_or(AppError::JobNotFound).map(Json)
}
