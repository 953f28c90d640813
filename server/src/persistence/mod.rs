//! Puzzle store: one SQLite table of Puzzle documents.
//!
//! The document itself is opaque JSON; only the fields the lookup queries
//! actually index (`target_elo`, the game date, the two player names) are
//! pulled out into real columns.

mod sqlite;

pub use sqlite::SqlitePuzzleStore;

use puzzle::Puzzle;
use std::future::Future;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("puzzle document didn't round-trip through JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("store call timed out")]
    Timeout,
}

/// Repository over the Puzzle document store.
///
/// Methods return `impl Future + Send` rather than `async fn` so the
/// futures are guaranteed `Send`, matching the rest of the workspace's
/// trait-based repository abstractions.
pub trait PuzzleRepository: Send + Sync {
    /// Insert `puzzles`, chunked into batches of 20.
    fn save_batch(
        &self,
        puzzles: &[Puzzle],
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// The timestamp of the most recently stored puzzle involving `user` as
    /// either player, or `None` if they have no stored puzzles yet.
    fn last_puzzle_timestamp(
        &self,
        user: &str,
    ) -> impl Future<Output = Result<Option<chrono::DateTime<chrono::Utc>>, PersistenceError>> + Send;

    /// A uniformly random puzzle whose `target_elo` falls within `tolerance`
    /// of `elo`.
    fn random_puzzle_near_elo(
        &self,
        elo: i32,
        tolerance: i32,
    ) -> impl Future<Output = Result<Option<Puzzle>, PersistenceError>> + Send;

    /// The single most recent puzzle involving `user` as either player, or
    /// `None` if they have none stored.
    fn last_puzzle_for_user(
        &self,
        user: &str,
    ) -> impl Future<Output = Result<Option<Puzzle>, PersistenceError>> + Send;

    /// Every stored puzzle involving `user` as either player with a game
    /// date at or after `since`, newest first.
    fn puzzles_for_user_since(
        &self,
        user: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> impl Future<Output = Result<Vec<Puzzle>, PersistenceError>> + Send;

    /// Every stored puzzle whose game date falls within `[start, end]`.
    fn puzzles_in_date_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> impl Future<Output = Result<Vec<Puzzle>, PersistenceError>> + Send;
}
