//! Forced-checkmate puzzle mining: the mate-tree expander, the per-game
//! pipeline that drives it, and the difficulty estimator that rates what it
//! finds. Everything here is engine-agnostic — it speaks to a chess engine
//! only through [`expand::MateSearch`], implemented for
//! [`engine::EngineSession`] in `adapter`.

mod adapter;
pub mod elo;
pub mod equivalence;
pub mod expand;
pub mod model;
pub mod pipeline;

pub use equivalence::filter_equivalent;
pub use expand::{expand, ExpandError, MateSearch, Memo};
pub use model::{EncodedMove, EngineLine, GameMeta, Puzzle, Turn};
pub use pipeline::{mine_puzzles, probe_position, PipelineConfig, PipelineError};
