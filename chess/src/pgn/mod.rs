//! PGN (tag pairs + movetext) and SAN parsing/formatting.

pub mod parser;
pub mod san;

pub use parser::{parse_pgn, parse_pgn_games, GameResult, PgnError, PgnGame, PgnMove};
pub use san::{format_san, parse_san, SanError};
