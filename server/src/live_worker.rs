//! Live worker: follows the upstream featured-game broadcast and mines
//! puzzles from positions as they're played, one game at a time.
//!
//! A `featured` message closes the previous analyser's channel (letting its
//! task drain and exit) and spawns a fresh one with its own engine session,
//! since sessions are never shared across concurrent consumers. A `fen`
//! message is normalized and handed to whichever analyser is currently
//! active; the channel is sized generously so the feed reader never blocks
//! on a slow analyser. Reconnects on a dropped feed; gives up after too many
//! consecutive failures.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use cozy_chess::Board;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use engine::{EngineSession, SearchFlags, SessionConfig};
use puzzle::{GameMeta, PipelineConfig};

use crate::jobs::Worker;
use crate::persistence::SqlitePuzzleStore;
use crate::upstream::live::{self, FeaturedPayload, LiveMessage};

const CHANNEL_CAPACITY: usize = 128;
const MAX_CONSECUTIVE_FAILURES: u32 = 5;
const DEFAULT_RATING: i32 = 1500;

pub struct LiveWorkerDeps {
    pub repo: Arc<SqlitePuzzleStore>,
    pub client: reqwest::Client,
    pub live_url: String,
    pub engine_path: String,
    pub engine_args: Vec<String>,
    pub multi_pv: u8,
    pub max_depth: u32,
    pub min_puzzle_mate_distance: i32,
}

struct State {
    terminated: bool,
    error: Option<String>,
}

pub struct LiveWorker {
    deps: LiveWorkerDeps,
    state: Mutex<State>,
    watched_positions: Arc<Mutex<HashSet<String>>>,
}

struct CurrentGame {
    tx: mpsc::Sender<Board>,
}

impl LiveWorker {
    pub fn new(deps: LiveWorkerDeps) -> Arc<Self> {
        Arc::new(Self {
            deps,
            state: Mutex::new(State {
                terminated: false,
                error: None,
            }),
            watched_positions: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    async fn run(self: Arc<Self>) {
        let mut consecutive_failures = 0u32;
        let mut current: Option<CurrentGame> = None;

        loop {
            let stream = match live::open_feed(&self.deps.client, &self.deps.live_url).await {
                Ok(stream) => stream,
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(error = %e, consecutive_failures, "live feed connect failed");
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        self.terminate(e.to_string());
                        return;
                    }
                    continue;
                }
            };
            tokio::pin!(stream);
            consecutive_failures = 0;

            while let Some(message) = stream.next().await {
                match message {
                    Ok(LiveMessage::Featured(payload)) => {
                        current = Some(self.start_new_game(payload));
                    }
                    Ok(LiveMessage::Fen(payload)) => {
                        let fen = live::normalize_fen(&payload.fen);
                        let Ok(board) = chess::fen::parse_fen(&fen) else {
                            continue;
                        };
                        if let Some(game) = &current {
                            let _ = game.tx.send(board).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "live feed message error, reconnecting");
                        break;
                    }
                }
            }

            consecutive_failures += 1;
            if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                self.terminate("live feed disconnected too many times".to_string());
                return;
            }
        }
    }

    fn start_new_game(&self, payload: FeaturedPayload) -> CurrentGame {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (white_rating, black_rating) = player_ratings(&payload.players);
        let game_meta = GameMeta {
            white: player_name(&payload.players, "white"),
            black: player_name(&payload.players, "black"),
            date: chrono::Utc::now(),
        };

        let repo = self.deps.repo.clone();
        let watched_positions = self.watched_positions.clone();
        let engine_path = self.deps.engine_path.clone();
        let engine_args = self.deps.engine_args.clone();
        let multi_pv = self.deps.multi_pv;
        let config = PipelineConfig {
            max_depth: self.deps.max_depth,
            min_puzzle_mate_distance: self.deps.min_puzzle_mate_distance,
        };

        tokio::spawn(async move {
            run_analyser(
                rx,
                repo,
                watched_positions,
                engine_path,
                engine_args,
                multi_pv,
                config,
                game_meta,
                white_rating,
                black_rating,
            )
            .await
        });

        let starting_fen = live::normalize_fen(&payload.fen);
        if let Ok(board) = chess::fen::parse_fen(&starting_fen) {
            let _ = tx.try_send(board);
        }

        CurrentGame { tx }
    }

    fn terminate(&self, error: String) {
        tracing::error!(error = %error, "live worker terminated");
        let mut state = self.state.lock().unwrap();
        state.terminated = true;
        state.error = Some(error);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_analyser(
    mut rx: mpsc::Receiver<Board>,
    repo: Arc<SqlitePuzzleStore>,
    watched_positions: Arc<Mutex<HashSet<String>>>,
    engine_path: String,
    engine_args: Vec<String>,
    multi_pv: u8,
    config: PipelineConfig,
    game_meta: GameMeta,
    white_rating: i32,
    black_rating: i32,
) {
    use crate::persistence::PuzzleRepository;

    let mut engine = match EngineSession::spawn(
        &engine_path,
        &engine_args,
        SessionConfig {
            multi_pv,
            ..Default::default()
        },
    )
    .await
    {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "live analyser failed to spawn engine, exiting");
            return;
        }
    };
    let flags = SearchFlags::default();

    while let Some(board) = rx.recv().await {
        let fen = board.to_string();
        if !watched_positions.lock().unwrap().insert(fen) {
            continue;
        }

        let rating = match chess::PieceColor::from(board.side_to_move()) {
            chess::PieceColor::White => white_rating,
            chess::PieceColor::Black => black_rating,
        };

        let puzzle = match puzzle::probe_position(
            &board,
            &mut engine,
            flags,
            config,
            rating,
            &[],
            game_meta.clone(),
        )
        .await
        {
            Ok(puzzle) => puzzle,
            Err(e) => {
                tracing::error!(error = %e, "live analyser engine failure, exiting");
                return;
            }
        };

        let Some(puzzle) = puzzle else {
            continue;
        };

        if let Err(e) = repo.save_batch(&[puzzle]).await {
            tracing::error!(error = %e, "live analyser store failure, exiting");
            return;
        }
    }
}

fn player_ratings(players: &[crate::upstream::live::PlayerInfo]) -> (i32, i32) {
    let rating_for = |color: &str| {
        players
            .iter()
            .find(|p| p.color == color)
            .map(|p| p.rating)
            .unwrap_or(DEFAULT_RATING)
    };
    (rating_for("white"), rating_for("black"))
}

fn player_name(players: &[crate::upstream::live::PlayerInfo], color: &str) -> String {
    players
        .iter()
        .find(|p| p.color == color)
        .map(|p| p.user.name.clone())
        .unwrap_or_default()
}

impl Worker for LiveWorker {
    fn start(self: Arc<Self>) {
        tokio::spawn(async move { self.run().await });
    }

    fn is_done(&self) -> bool {
        self.state.lock().unwrap().terminated
    }

    fn progress(&self) -> f64 {
        if self.is_done() {
            1.0
        } else {
            0.0
        }
    }

    fn result(&self) -> Option<Vec<puzzle::Puzzle>> {
        None
    }

    fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::live::PlayerUser;

    fn player(color: &str, rating: i32, name: &str) -> live::PlayerInfo {
        live::PlayerInfo {
            color: color.to_string(),
            user: PlayerUser {
                name: name.to_string(),
                id: "id".to_string(),
                title: None,
            },
            rating,
        }
    }

    #[test]
    fn ratings_are_matched_by_color() {
        let players = vec![player("white", 2400, "alice"), player("black", 2100, "bob")];
        assert_eq!(player_ratings(&players), (2400, 2100));
    }

    #[test]
    fn missing_color_falls_back_to_default_rating() {
        let players = vec![player("white", 2400, "alice")];
        assert_eq!(player_ratings(&players), (2400, DEFAULT_RATING));
    }

    #[test]
    fn name_is_read_from_matching_color() {
        let players = vec![player("white", 2400, "alice"), player("black", 2100, "bob")];
        assert_eq!(player_name(&players, "black"), "bob");
    }
}
