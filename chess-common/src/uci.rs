//! Long-coordinate (UCI) move encoding shared by the `chess` and `engine` crates.
//!
//! This only handles the wire shape of a move (`e2e4`, `e7e8q`) — board-aware
//! concerns like castling-notation translation live in `chess::uci`, since
//! they need a legal-move list to disambiguate.

use cozy_chess::{Move, Square};

use crate::converters::{format_piece, format_square, parse_promotion, parse_square};

/// Errors produced while decoding a long-coordinate move string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UciMoveError {
    #[error("malformed uci move: {0:?}")]
    Malformed(String),
}

/// Format a move in long-coordinate notation (e.g. `e2e4`, `e7e8q`).
pub fn format_long_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}

/// Parse a long-coordinate move string into a [`Move`].
///
/// Does not know about castling-notation differences between UCI and
/// `cozy_chess` — callers with a legal-move list should reconcile that
/// themselves (see `chess::uci::convert_uci_castling_to_cozy`).
pub fn parse_long_move(s: &str) -> Result<Move, UciMoveError> {
    let bytes = s.as_bytes();
    if bytes.len() != 4 && bytes.len() != 5 {
        return Err(UciMoveError::Malformed(s.to_string()));
    }
    let from: Square =
        parse_square(&s[0..2]).ok_or_else(|| UciMoveError::Malformed(s.to_string()))?;
    let to: Square =
        parse_square(&s[2..4]).ok_or_else(|| UciMoveError::Malformed(s.to_string()))?;
    let promotion = if bytes.len() == 5 {
        Some(
            parse_promotion(s.chars().nth(4).unwrap())
                .ok_or_else(|| UciMoveError::Malformed(s.to_string()))?,
        )
    } else {
        None
    };
    Ok(Move {
        from,
        to,
        promotion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::{File, Piece, Rank};

    #[test]
    fn round_trips_quiet_move() {
        let mv = Move {
            from: Square::new(File::E, Rank::Second),
            to: Square::new(File::E, Rank::Fourth),
            promotion: None,
        };
        assert_eq!(format_long_move(mv), "e2e4");
        assert_eq!(parse_long_move("e2e4"), Ok(mv));
    }

    #[test]
    fn round_trips_promotion() {
        let mv = Move {
            from: Square::new(File::E, Rank::Seventh),
            to: Square::new(File::E, Rank::Eighth),
            promotion: Some(Piece::Queen),
        };
        assert_eq!(format_long_move(mv), "e7e8q");
        assert_eq!(parse_long_move("e7e8q"), Ok(mv));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_long_move("e2").is_err());
        assert!(parse_long_move("e2e4qq").is_err());
        assert!(parse_long_move("z2e4").is_err());
    }
}
