pub mod fen;
pub mod pgn;
pub mod types;

pub use chess_common::converters::*;
pub use types::{PieceColor, PieceKind};
