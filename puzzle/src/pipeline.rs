//! The per-game puzzle pipeline: replay a game, probe every reached
//! position for a qualifying forced mate, and tag each one with a difficulty
//! rating.

use std::collections::HashSet;

use chess::pgn::PgnGame;
use chess::PieceColor;
use cozy_chess::Board;

use crate::elo::estimate_target_elo;
use crate::equivalence::filter_equivalent;
use crate::expand::{expand, ExpandError, MateSearch, Memo};
use crate::model::{GameMeta, Puzzle};

/// Both knobs are tunable rather than hard-coded. Default pairing:
/// `max_depth=6`, `min_puzzle_mate_distance=2` (a non-trivial mate in ≥ 2).
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub max_depth: u32,
    pub min_puzzle_mate_distance: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_puzzle_mate_distance: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError<E: std::error::Error + Send + Sync + 'static> {
    #[error("engine error while mining puzzles: {0}")]
    Engine(#[from] E),
    #[error(transparent)]
    Expand(#[from] ExpandError<E>),
    #[error("invalid starting position: {0}")]
    InvalidStartPosition(#[from] chess::fen::FenError),
}

/// Replay `game` from its starting position (its `FEN`/`SetUp` tags, or the
/// standard start), probing every reached position for a qualifying forced
/// mate and rating each one against the moves actually played afterward.
pub async fn mine_puzzles<S: MateSearch>(
    game: &PgnGame,
    engine: &mut S,
    flags: S::Flags,
    config: PipelineConfig,
    white_rating: i32,
    black_rating: i32,
) -> Result<Vec<Puzzle>, PipelineError<S::Error>> {
    let mut board = start_board(game)?;
    let game_meta = extract_game_meta(&game.tags);
    let mut seen_fens = HashSet::new();
    let mut puzzles = Vec::new();

    for (idx, pgn_move) in game.moves.iter().enumerate() {
        board.play_unchecked(pgn_move.mv);
        if !seen_fens.insert(board.to_string()) {
            continue;
        }

        let side_to_move = PieceColor::from(board.side_to_move());
        let rating = match side_to_move {
            PieceColor::White => white_rating,
            PieceColor::Black => black_rating,
        };
        let played_from_puzzle: Vec<String> =
            game.moves[idx + 1..].iter().map(|m| m.san.clone()).collect();

        if let Some(puzzle) = probe_position(
            &board,
            engine,
            flags,
            config,
            rating,
            &played_from_puzzle,
            game_meta.clone(),
        )
        .await?
        {
            puzzles.push(puzzle);
        }
    }

    Ok(puzzles)
}

/// Probe a single position: if the engine reports a qualifying forced mate,
/// expand its full equivalence-filtered variation tree and rate it against
/// `played_after` (the moves actually played past this point, if known).
/// Used both by [`mine_puzzles`]'s per-game replay and by a live analyser
/// watching positions arrive one at a time with no further moves known yet.
pub async fn probe_position<S: MateSearch>(
    board: &Board,
    engine: &mut S,
    flags: S::Flags,
    config: PipelineConfig,
    rating: i32,
    played_after: &[String],
    game_meta: GameMeta,
) -> Result<Option<Puzzle>, PipelineError<S::Error>> {
    let fen = board.to_string();
    engine.set_position(&fen).await?;
    let lines = engine.search(config.max_depth, flags).await?;
    if lines.is_empty() {
        return Ok(None);
    }

    let head = &lines[0];
    if !(head.is_mate && head.score >= config.min_puzzle_mate_distance) {
        return Ok(None);
    }

    let candidates = filter_equivalent(lines);
    let mut memo = Memo::new();
    let mut first_turns = Vec::new();
    for candidate in &candidates {
        if let Some(turn) = expand(board, engine, candidate, flags, &mut memo).await? {
            first_turns.push(turn);
        }
    }
    if first_turns.is_empty() {
        return Ok(None);
    }

    let side_to_move = PieceColor::from(board.side_to_move());
    let target_elo = estimate_target_elo(&first_turns, played_after, rating);

    Ok(Some(Puzzle {
        start_fen: fen,
        side_to_move,
        first_turns,
        game_meta,
        target_elo,
    }))
}

fn start_board(game: &PgnGame) -> Result<Board, chess::fen::FenError> {
    match game.tags.get("FEN") {
        Some(fen) => chess::fen::parse_fen(fen),
        None => Ok(Board::default()),
    }
}

/// Player names and the game's UTC timestamp, read from PGN tag pairs.
/// `UTCDate` (`YYYY.MM.DD`) and `UTCTime` (`HH:MM:SS`) combine into one
/// instant; either missing tag falls back to the Unix epoch.
fn extract_game_meta(tags: &std::collections::HashMap<String, String>) -> GameMeta {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    let date = tags
        .get("UTCDate")
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y.%m.%d").ok());
    let time = tags
        .get("UTCTime")
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok());

    let instant = match (date, time) {
        (Some(d), Some(t)) => Utc.from_utc_datetime(&d.and_time(t)),
        _ => Utc.timestamp_opt(0, 0).single().unwrap(),
    };

    GameMeta {
        white: tags.get("White").cloned().unwrap_or_default(),
        black: tags.get("Black").cloned().unwrap_or_default(),
        date: instant,
    }
}
