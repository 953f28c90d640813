//! Archive worker: mines one user's recent games for puzzles and stores them.
//!
//! Fetches games played since the newest puzzle already on file for the
//! user, backfilling older games if the upstream didn't return enough fresh
//! ones to satisfy the requested count, then runs the mining pipeline over
//! each game against a freshly spawned engine session.

use std::sync::{Arc, Mutex};

use tokio::sync::OwnedSemaphorePermit;

use engine::{EngineSession, SearchFlags, SessionConfig};
use puzzle::{Puzzle, PipelineConfig};

use crate::error::AppError;
use crate::jobs::Worker;
use crate::persistence::{PersistenceError, PuzzleRepository, SqlitePuzzleStore};
use crate::upstream::{archive, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveWorkerError {
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("engine error: {0}")]
    Engine(#[from] engine::SessionError),
    #[error("mining error: {0}")]
    Pipeline(#[from] puzzle::PipelineError<engine::SessionError>),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl ArchiveWorkerError {
    /// The user-facing message surfaced on `/job/{id}`, sharing `AppError`'s
    /// wording so a failed archive job and a failed `/task/{user}` request
    /// never disagree about what a user sees for the same underlying cause.
    fn user_facing(&self, user: &str) -> String {
        let app_error = match self {
            ArchiveWorkerError::Upstream(UpstreamError::UserNotFound(_)) => {
                AppError::UserNotFound { user: user.to_string() }
            }
            ArchiveWorkerError::Upstream(_) => AppError::FetchGames { user: user.to_string() },
            ArchiveWorkerError::Engine(_) | ArchiveWorkerError::Pipeline(_) => AppError::PuzzleGeneration,
            ArchiveWorkerError::Persistence(_) => AppError::Persistence,
        };
        app_error.to_string()
    }
}

pub struct ArchiveWorkerDeps {
    pub repo: Arc<SqlitePuzzleStore>,
    pub client: reqwest::Client,
    pub archive_base_url: String,
    pub engine_path: String,
    pub engine_args: Vec<String>,
    pub multi_pv: u8,
    pub max_depth: u32,
    pub min_puzzle_mate_distance: i32,
    pub user: String,
    pub requested_games: u32,
}

struct WorkerState {
    done: bool,
    progress: f64,
    result: Option<Vec<Puzzle>>,
    error: Option<String>,
    /// Held for the duration of `run`; releasing it frees a slot in the
    /// `ARCHIVE_WORKER_COUNT` concurrency cap (`jobs::JobManager` doesn't
    /// enforce this — it's scoped to archive jobs specifically, since the
    /// live worker never goes through the job manager at all).
    permit: Option<OwnedSemaphorePermit>,
}

pub struct ArchiveWorker {
    deps: ArchiveWorkerDeps,
    state: Mutex<WorkerState>,
}

impl ArchiveWorker {
    pub fn new(deps: ArchiveWorkerDeps, permit: OwnedSemaphorePermit) -> Arc<Self> {
        Arc::new(Self {
            deps,
            state: Mutex::new(WorkerState {
                done: false,
                progress: 0.0,
                result: None,
                error: None,
                permit: Some(permit),
            }),
        })
    }

    async fn run(&self) {
        match self.run_inner().await {
            Ok(puzzles) => {
                let mut state = self.state.lock().unwrap();
                state.result = Some(puzzles);
                state.progress = 1.0;
                state.done = true;
                state.permit = None;
            }
            Err(e) => {
                tracing::warn!(user = %self.deps.user, error = %e, "archive worker failed");
                let mut state = self.state.lock().unwrap();
                state.error = Some(e.user_facing(&self.deps.user));
                state.done = true;
                state.permit = None;
            }
        }
    }

    async fn run_inner(&self) -> Result<Vec<Puzzle>, ArchiveWorkerError> {
        let since = self.deps.repo.last_puzzle_timestamp(&self.deps.user).await?;
        let since_ms = since.map(|t| t.timestamp_millis() + 1_000);

        let mut games = archive::fetch_games(
            &self.deps.client,
            &self.deps.archive_base_url,
            &self.deps.user,
            self.deps.requested_games,
            since_ms,
            None,
        )
        .await?;

        if (games.len() as u32) < self.deps.requested_games {
            let missing = self.deps.requested_games - games.len() as u32;
            let older = archive::fetch_games(
                &self.deps.client,
                &self.deps.archive_base_url,
                &self.deps.user,
                missing,
                None,
                since_ms,
            )
            .await?;
            games.extend(older);
        }

        self.set_progress(0.1);

        let mut engine = EngineSession::spawn(
            &self.deps.engine_path,
            &self.deps.engine_args,
            SessionConfig {
                multi_pv: self.deps.multi_pv,
                ..Default::default()
            },
        )
        .await?;

        let config = PipelineConfig {
            max_depth: self.deps.max_depth,
            min_puzzle_mate_distance: self.deps.min_puzzle_mate_distance,
        };
        let flags = SearchFlags::default();

        let total = games.len().max(1);
        let mut all_puzzles = Vec::new();
        for (done, game) in games.iter().enumerate() {
            let (white_rating, black_rating) = player_ratings(&game.tags);
            let puzzles = puzzle::mine_puzzles(
                game,
                &mut engine,
                flags,
                config,
                white_rating,
                black_rating,
            )
            .await?;
            all_puzzles.extend(puzzles);
            self.set_progress(0.1 + 0.9 * (done + 1) as f64 / total as f64);
        }

        self.deps.repo.save_batch(&all_puzzles).await?;
        Ok(all_puzzles)
    }

    fn set_progress(&self, value: f64) {
        self.state.lock().unwrap().progress = value;
    }
}

fn player_ratings(tags: &std::collections::HashMap<String, String>) -> (i32, i32) {
    const DEFAULT_RATING: i32 = 1500;
    let white = tags
        .get("WhiteElo")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RATING);
    let black = tags
        .get("BlackElo")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RATING);
    (white, black)
}

impl Worker for ArchiveWorker {
    fn start(self: Arc<Self>) {
        tokio::spawn(async move { self.run().await });
    }

    fn is_done(&self) -> bool {
        self.state.lock().unwrap().done
    }

    fn progress(&self) -> f64 {
        self.state.lock().unwrap().progress
    }

    fn result(&self) -> Option<Vec<Puzzle>> {
        self.state.lock().unwrap().result.clone()
    }

    fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ratings_fall_back_to_default() {
        let tags = std::collections::HashMap::new();
        assert_eq!(player_ratings(&tags), (1500, 1500));
    }

    #[test]
    fn present_ratings_are_parsed() {
        let mut tags = std::collections::HashMap::new();
        tags.insert("WhiteElo".to_string(), "2100".to_string());
        tags.insert("BlackElo".to_string(), "1950".to_string());
        assert_eq!(player_ratings(&tags), (2100, 1950));
    }

    #[test]
    fn upstream_user_not_found_surfaces_the_spec_exact_message() {
        let err = ArchiveWorkerError::Upstream(UpstreamError::UserNotFound("alice".to_string()));
        assert_eq!(err.user_facing("alice"), "user alice doesn't exist");
    }

    #[test]
    fn other_upstream_failures_surface_fetch_games_message() {
        let err = ArchiveWorkerError::Upstream(UpstreamError::Json(
            serde_json::from_str::<()>("not json").unwrap_err(),
        ));
        assert_eq!(err.user_facing("alice"), "error fetching alice games");
    }

    #[test]
    fn engine_and_pipeline_failures_surface_puzzle_generation_message() {
        let engine_err = ArchiveWorkerError::Engine(engine::SessionError::EngineExited);
        assert_eq!(engine_err.user_facing("alice"), "error generating puzzles");

        let pipeline_err = ArchiveWorkerError::Pipeline(puzzle::PipelineError::Engine(
            engine::SessionError::EngineExited,
        ));
        assert_eq!(pipeline_err.user_facing("alice"), "error generating puzzles");
    }

    #[test]
    fn persistence_failures_surface_saving_message() {
        let err = ArchiveWorkerError::Persistence(PersistenceError::Migration("boom".to_string()));
        assert_eq!(err.user_facing("alice"), "error saving tasks to db");
    }
}
