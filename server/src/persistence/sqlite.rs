//! SQLite-backed `PuzzleRepository`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use puzzle::Puzzle;

use super::{PersistenceError, PuzzleRepository};

const BATCH_SIZE: usize = 20;

/// Deadline for a single read or a single-row insert.
const SINGLE_CALL_TIMEOUT: Duration = Duration::from_secs(1);
/// Deadline for a batched insert transaction (`save_batch`).
const BATCH_CALL_TIMEOUT: Duration = Duration::from_secs(20);

/// Run `fut`, failing with `PersistenceError::Timeout` if it doesn't
/// resolve within `deadline`.
async fn with_timeout<T>(
    deadline: Duration,
    fut: impl std::future::Future<Output = Result<T, PersistenceError>>,
) -> Result<T, PersistenceError> {
    tokio::time::timeout(deadline, fut)
        .await
        .unwrap_or(Err(PersistenceError::Timeout))
}

#[derive(Clone)]
pub struct SqlitePuzzleStore {
    pool: SqlitePool,
}

impl SqlitePuzzleStore {
    /// Open (or create) the database at `path` and run embedded migrations.
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PersistenceError::Migration(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PersistenceError::Migration(e.to_string()))?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        Ok(Self { pool })
    }
}

impl PuzzleRepository for SqlitePuzzleStore {
    async fn save_batch(&self, puzzles: &[Puzzle]) -> Result<(), PersistenceError> {
        with_timeout(BATCH_CALL_TIMEOUT, async {
            for chunk in puzzles.chunks(BATCH_SIZE) {
                let mut tx = self.pool.begin().await?;
                for puzzle in chunk {
                    let data = serde_json::to_string(puzzle)?;
                    sqlx::query(
                        r#"
                        INSERT INTO puzzles
                            (id, start_fen, white_player, black_player, game_date, target_elo, data)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(uuid::Uuid::new_v4().to_string())
                    .bind(&puzzle.start_fen)
                    .bind(&puzzle.game_meta.white)
                    .bind(&puzzle.game_meta.black)
                    .bind(puzzle.game_meta.date.timestamp())
                    .bind(puzzle.target_elo)
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await?;
            }
            Ok(())
        })
        .await
    }

    async fn last_puzzle_timestamp(
        &self,
        user: &str,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, PersistenceError> {
        with_timeout(SINGLE_CALL_TIMEOUT, async {
            let row: Option<(i64,)> = sqlx::query_as(
                r#"
                SELECT MAX(game_date) FROM puzzles
                WHERE white_player = ?1 OR black_player = ?1
                "#,
            )
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.and_then(|(ts,)| chrono::DateTime::from_timestamp(ts, 0)))
        })
        .await
    }

    async fn random_puzzle_near_elo(&self, elo: i32, tolerance: i32) -> Result<Option<Puzzle>, PersistenceError> {
        with_timeout(SINGLE_CALL_TIMEOUT, async {
            let row: Option<(String,)> = sqlx::query_as(
                r#"
                SELECT data FROM puzzles
                WHERE target_elo BETWEEN ?1 AND ?2
                ORDER BY RANDOM()
                LIMIT 1
                "#,
            )
            .bind(elo - tolerance)
            .bind(elo + tolerance)
            .fetch_optional(&self.pool)
            .await?;

            Ok(match row {
                Some((data,)) => Some(serde_json::from_str(&data)?),
                None => None,
            })
        })
        .await
    }

    async fn last_puzzle_for_user(&self, user: &str) -> Result<Option<Puzzle>, PersistenceError> {
        with_timeout(SINGLE_CALL_TIMEOUT, async {
            let row: Option<(String,)> = sqlx::query_as(
                r#"
                SELECT data FROM puzzles
                WHERE white_player = ?1 OR black_player = ?1
                ORDER BY game_date DESC
                LIMIT 1
                "#,
            )
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;

            Ok(match row {
                Some((data,)) => Some(serde_json::from_str(&data)?),
                None => None,
            })
        })
        .await
    }

    async fn puzzles_for_user_since(
        &self,
        user: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Puzzle>, PersistenceError> {
        with_timeout(SINGLE_CALL_TIMEOUT, async {
            let rows: Vec<(String,)> = sqlx::query_as(
                r#"
                SELECT data FROM puzzles
                WHERE (white_player = ?1 OR black_player = ?1) AND game_date >= ?2
                ORDER BY game_date DESC
                "#,
            )
            .bind(user)
            .bind(since.timestamp())
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter()
                .map(|(data,)| serde_json::from_str(&data).map_err(PersistenceError::from))
                .collect()
        })
        .await
    }

    async fn puzzles_in_date_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Puzzle>, PersistenceError> {
        with_timeout(SINGLE_CALL_TIMEOUT, async {
            let rows: Vec<(String,)> = sqlx::query_as(
                r#"
                SELECT data FROM puzzles
                WHERE game_date BETWEEN ?1 AND ?2
                ORDER BY game_date DESC
                "#,
            )
            .bind(start.timestamp())
            .bind(end.timestamp())
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter()
                .map(|(data,)| serde_json::from_str(&data).map_err(PersistenceError::from))
                .collect()
        })
        .await
    }
}
