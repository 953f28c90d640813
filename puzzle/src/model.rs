//! Core data model: positions, the dual-encoded move, engine lines, the
//! mate-tree node (`Turn`), and the emitted `Puzzle`.

use chess::PieceColor;
use chess_common::uci::format_long_move;
use cozy_chess::Move;
use serde::{Deserialize, Serialize};

/// One entry in an engine's multi-line response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLine {
    pub is_mate: bool,
    /// Centipawns if `!is_mate`; mate-distance in plies if `is_mate`,
    /// negative when the side to move is the one being mated.
    pub score: i32,
    /// Ordered principal variation, at least one move, in long coordinate
    /// form.
    pub best_moves: Vec<Move>,
}

impl EngineLine {
    pub fn first_move(&self) -> Option<Move> {
        self.best_moves.first().copied()
    }

    pub fn second_move(&self) -> Option<Move> {
        self.best_moves.get(1).copied()
    }
}

impl From<engine::EngineLine> for EngineLine {
    fn from(line: engine::EngineLine) -> Self {
        match line.score {
            engine::LineScore::Mate(plies) => Self {
                is_mate: true,
                score: plies,
                best_moves: line.best_moves,
            },
            engine::LineScore::Centipawns(cp) => Self {
                is_mate: false,
                score: cp,
                best_moves: line.best_moves,
            },
        }
    }
}

/// A move given in both long coordinate and short algebraic form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMove {
    pub long: String,
    pub san: String,
}

impl EncodedMove {
    pub fn new(board: &cozy_chess::Board, mv: Move) -> Self {
        Self {
            long: format_long_move(mv),
            san: chess::pgn::san::format_san(board, mv),
        }
    }
}

/// One node of a forced-mate variation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub san: String,
    pub is_last: bool,
    pub reply_san: String,
    pub continuations: Vec<Turn>,
}

impl Turn {
    pub fn leaf(san: String) -> Self {
        Self {
            san,
            is_last: true,
            reply_san: String::new(),
            continuations: Vec::new(),
        }
    }

    pub fn branch(san: String, reply_san: String, continuations: Vec<Turn>) -> Self {
        Self {
            san,
            is_last: false,
            reply_san,
            continuations,
        }
    }

    /// `1` at a leaf, otherwise `1 + min over children` — the minimum
    /// number of further attacker moves to reach a mate from this node.
    pub fn min_remaining_depth(&self) -> u32 {
        if self.is_last {
            1
        } else {
            1 + self
                .continuations
                .iter()
                .map(Turn::min_remaining_depth)
                .min()
                .unwrap_or(0)
        }
    }
}

/// Player/date metadata carried from the source game's tag pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMeta {
    pub white: String,
    pub black: String,
    pub date: chrono::DateTime<chrono::Utc>,
}

/// A materialised forced-mate puzzle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Puzzle {
    pub start_fen: String,
    pub side_to_move: PieceColor,
    pub first_turns: Vec<Turn>,
    pub game_meta: GameMeta,
    pub target_elo: i32,
}
