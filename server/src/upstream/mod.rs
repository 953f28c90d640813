//! Upstream HTTP collaborators: the game archive and the live broadcast
//! feed. Both upstream quirks (the three-per-game archive reconciliation,
//! the live feed's short-FEN suffix) are isolated here so the rest of the
//! pipeline never sees them.

pub mod archive;
pub mod live;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("user {0} doesn't exist")]
    UserNotFound(String),
    #[error("malformed PGN from upstream: {0}")]
    Pgn(#[from] chess::pgn::PgnError),
    #[error("malformed live message: {0}")]
    Json(#[from] serde_json::Error),
}
