//! Wires the engine crate's `EngineSession` into the mate-tree expander's
//! `MateSearch` trait, so production code can hand a live subprocess to
//! `expand`/`mine_puzzles` without either module depending on the other's
//! types directly.

use engine::{EngineSession, SearchFlags, SessionError};

use crate::expand::MateSearch;
use crate::model::EngineLine;

impl MateSearch for EngineSession {
    type Error = SessionError;
    type Flags = SearchFlags;

    async fn set_position(&mut self, fen: &str) -> Result<(), SessionError> {
        EngineSession::set_position(self, fen).await
    }

    async fn search(&mut self, depth: u32, flags: SearchFlags) -> Result<Vec<EngineLine>, SessionError> {
        let lines = EngineSession::search(self, depth, flags).await?;
        Ok(lines.into_iter().map(EngineLine::from).collect())
    }
}
