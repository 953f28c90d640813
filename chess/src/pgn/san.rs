//! Standard Algebraic Notation: parsing and formatting moves against a board.

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use chess_common::converters::{format_file, format_rank, format_square, parse_promotion};

/// Parse a Standard Algebraic Notation move against the given position.
///
/// Resolves disambiguation and castling by matching against the position's
/// legal moves; returns [`SanError::NoLegalMove`]/[`SanError::AmbiguousMove`]
/// when the text doesn't uniquely identify one of them.
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let san = san.trim_end_matches(['+', '#']).trim();
    let side = board.side_to_move();

    if san == "O-O" || san == "0-0" {
        return find_castle(board, side, true);
    }
    if san == "O-O-O" || san == "0-0-0" {
        return find_castle(board, side, false);
    }

    let (body, promotion) = match san.split_once('=') {
        Some((b, p)) => {
            let piece = p
                .chars()
                .next()
                .and_then(parse_promotion)
                .ok_or_else(|| SanError::InvalidPromotion(p.to_string()))?;
            (b, Some(piece))
        }
        None => (san, None),
    };

    let mut chars: Vec<char> = body.chars().collect();
    let piece = match chars.first() {
        Some('K') => Some(Piece::King),
        Some('Q') => Some(Piece::Queen),
        Some('R') => Some(Piece::Rook),
        Some('B') => Some(Piece::Bishop),
        Some('N') => Some(Piece::Knight),
        _ => None,
    };
    if piece.is_some() {
        chars.remove(0);
    }
    let piece = piece.unwrap_or(Piece::Pawn);

    // Drop the capture marker; it's redundant with the board state.
    chars.retain(|&c| c != 'x');

    if chars.len() < 2 {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let to = parse_square_chars(&chars[chars.len() - 2..])?;

    let disambiguator = &chars[..chars.len() - 2];
    let from_file = disambiguator.iter().find(|c| c.is_ascii_lowercase()).copied();
    let from_rank = disambiguator.iter().find(|c| c.is_ascii_digit()).copied();

    let mut candidates = Vec::new();
    board.generate_moves(|mvs| {
        if mvs.piece == piece {
            for mv in mvs {
                if mv.to != to || mv.promotion != promotion {
                    continue;
                }
                if is_castle_move(board, mv) {
                    continue;
                }
                if let Some(f) = from_file {
                    if format_file(mv.from.file()) != f {
                        continue;
                    }
                }
                if let Some(r) = from_rank {
                    if format_rank(mv.from.rank()) != r {
                        continue;
                    }
                }
                candidates.push(mv);
            }
        }
        false
    });

    match candidates.len() {
        0 => Err(SanError::NoLegalMove(san.to_string())),
        1 => Ok(candidates[0]),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

fn parse_square_chars(chars: &[char]) -> Result<Square, SanError> {
    let file =
        chess_common::converters::parse_file(chars[0]).ok_or(SanError::InvalidFile(chars[0]))?;
    let rank =
        chess_common::converters::parse_rank(chars[1]).ok_or(SanError::InvalidRank(chars[1]))?;
    Ok(Square::new(file, rank))
}

fn find_castle(board: &Board, side: cozy_chess::Color, kingside: bool) -> Result<Move, SanError> {
    let _ = side;
    let mut found = None;
    board.generate_moves(|mvs| {
        if mvs.piece == Piece::King {
            for mv in mvs {
                if !is_castle_move(board, mv) {
                    continue;
                }
                if (mv.to.file() > mv.from.file()) == kingside {
                    found = Some(mv);
                }
            }
        }
        false
    });
    found.ok_or_else(|| SanError::NoLegalMove(if kingside { "O-O" } else { "O-O-O" }.to_string()))
}

/// `cozy_chess` represents castling as the king "capturing" its own rook.
fn is_castle_move(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == Some(board.side_to_move())
}

/// Format a legal move as SAN, including check/mate suffixes.
///
/// `mv` must be legal in `board`; this never re-validates against the move
/// generator, so an illegal move produces nonsensical output rather than
/// an error.
pub fn format_san(board: &Board, mv: Move) -> String {
    let mut san = String::new();
    let piece = board.piece_on(mv.from);

    if piece == Some(Piece::King) && is_castle_move(board, mv) {
        san.push_str(if mv.to.file() > mv.from.file() {
            "O-O"
        } else {
            "O-O-O"
        });
    } else {
        let is_capture = board.piece_on(mv.to).is_some()
            || (piece == Some(Piece::Pawn) && mv.from.file() != mv.to.file());

        match piece {
            Some(Piece::King) => san.push('K'),
            Some(Piece::Queen) => san.push('Q'),
            Some(Piece::Rook) => san.push('R'),
            Some(Piece::Bishop) => san.push('B'),
            Some(Piece::Knight) => san.push('N'),
            Some(Piece::Pawn) => {
                if is_capture {
                    san.push(format_file(mv.from.file()));
                }
            }
            None => {}
        }

        if !matches!(piece, Some(Piece::Pawn) | None) {
            san.push_str(&disambiguator(board, mv, piece));
        }

        if is_capture {
            san.push('x');
        }

        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(match promo {
                Piece::Queen => 'Q',
                Piece::Rook => 'R',
                Piece::Bishop => 'B',
                Piece::Knight => 'N',
                _ => unreachable!("pawns only promote to Q/R/B/N"),
            });
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if !after.checkers().is_empty() {
        san.push(if after.status() == cozy_chess::GameStatus::Won {
            '#'
        } else {
            '+'
        });
    }

    san
}

/// Resolve file/rank/full-square disambiguation against the other legal
/// moves of the same piece kind that also land on `mv.to`.
fn disambiguator(board: &Board, mv: Move, piece: Option<Piece>) -> String {
    let Some(piece) = piece else {
        return String::new();
    };
    let mut same_file = false;
    let mut same_rank = false;
    let mut others = 0;

    board.generate_moves(|mvs| {
        if mvs.piece == piece {
            for other in mvs {
                if other.to != mv.to || other.from == mv.from || is_castle_move(board, other) {
                    continue;
                }
                others += 1;
                if other.from.file() == mv.from.file() {
                    same_file = true;
                }
                if other.from.rank() == mv.from.rank() {
                    same_rank = true;
                }
            }
        }
        false
    });

    if others == 0 {
        String::new()
    } else if !same_file {
        format_file(mv.from.file()).to_string()
    } else if !same_rank {
        format_rank(mv.from.rank()).to_string()
    } else {
        format_square(mv.from)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid file: {0}")]
    InvalidFile(char),
    #[error("Invalid rank: {0}")]
    InvalidRank(char),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(fen: &str) -> Board {
        fen.parse().unwrap()
    }

    #[test]
    fn formats_simple_pawn_push() {
        let b = Board::default();
        let mv = Move {
            from: Square::new(File::E, Rank::Second),
            to: Square::new(File::E, Rank::Fourth),
            promotion: None,
        };
        assert_eq!(format_san(&b, mv), "e4");
    }

    #[test]
    fn formats_knight_disambiguation_by_file() {
        let b = board("4k3/8/8/8/8/2N3N1/8/4K3 w - - 0 1");
        let mv = Move {
            from: Square::new(File::C, Rank::Third),
            to: Square::new(File::E, Rank::Fourth),
            promotion: None,
        };
        assert_eq!(format_san(&b, mv), "Nce4");
    }

    #[test]
    fn formats_check_suffix() {
        let b = board("k7/8/8/8/8/8/8/R6K w - - 0 1");
        let mv = Move {
            from: Square::new(File::A, Rank::First),
            to: Square::new(File::A, Rank::Seventh),
            promotion: None,
        };
        assert_eq!(format_san(&b, mv), "Ra7+");
    }

    #[test]
    fn parses_and_formats_round_trip() {
        let b = Board::default();
        let mv = parse_san(&b, "e4").unwrap();
        assert_eq!(format_san(&b, mv), "e4");
    }

    #[test]
    fn parses_castling() {
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let mv = parse_san(&b, "O-O").unwrap();
        assert_eq!(format_san(&b, mv), "O-O");
    }
}
