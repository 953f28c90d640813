//! PGN tag-pair and movetext parsing.

use cozy_chess::{Board, Move};
use std::collections::HashMap;

use super::san;

/// A parsed PGN game.
#[derive(Debug, Clone)]
pub struct PgnGame {
    pub tags: HashMap<String, String>,
    pub moves: Vec<PgnMove>,
    pub result: GameResult,
}

/// A single move in PGN with metadata.
#[derive(Debug, Clone)]
pub struct PgnMove {
    pub mv: Move,
    pub san: String,
    pub comment: Option<String>,
    pub nags: Vec<u8>, // Numeric Annotation Glyphs (!!, ?, etc.)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Ongoing,
}

impl GameResult {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(Self::WhiteWins),
            "0-1" => Some(Self::BlackWins),
            "1/2-1/2" => Some(Self::Draw),
            "*" => Some(Self::Ongoing),
            _ => None,
        }
    }
}

/// Parse a single PGN game (tag pairs + movetext) starting from the position
/// given by its `FEN`/`SetUp` tags, or the standard start position.
pub fn parse_pgn(input: &str) -> Result<PgnGame, PgnError> {
    let (tag_section, movetext) = split_sections(input);
    let tags = parse_tags(tag_section)?;

    let mut board = match tags.get("FEN") {
        Some(fen) => fen.parse::<Board>().map_err(|_| PgnError::InvalidFen(fen.clone()))?,
        None => Board::default(),
    };

    let mut moves = Vec::new();
    let mut result = GameResult::Ongoing;

    for token in movetext_tokens(movetext) {
        match token {
            Token::Result(r) => {
                result = r;
                break;
            }
            Token::San(san_text) => {
                let mv = san::parse_san(&board, &san_text)?;
                board.play_unchecked(mv);
                moves.push(PgnMove {
                    mv,
                    san: san_text,
                    comment: None,
                    nags: Vec::new(),
                });
            }
            Token::Comment(text) => {
                if let Some(last) = moves.last_mut() {
                    last.comment = Some(text);
                }
            }
            Token::Nag(n) => {
                if let Some(last) = moves.last_mut() {
                    last.nags.push(n);
                }
            }
        }
    }

    Ok(PgnGame {
        tags,
        moves,
        result,
    })
}

/// Parse every game in a multi-game PGN file (games are separated by blank
/// lines following a result token).
pub fn parse_pgn_games(input: &str) -> Result<Vec<PgnGame>, PgnError> {
    split_games(input).into_iter().map(parse_pgn).collect()
}

/// Split a multi-game PGN blob into per-game slices. A new game starts at a
/// `[Tag ...]` line once movetext has already been seen for the current one.
fn split_games(input: &str) -> Vec<&str> {
    let mut games = Vec::new();
    let mut start = 0;
    let mut saw_movetext = false;
    let mut offset = 0;

    for line in input.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            if saw_movetext {
                games.push(input[start..offset].trim());
                start = offset;
                saw_movetext = false;
            }
        } else if !trimmed.is_empty() {
            saw_movetext = true;
        }
        offset += line.len();
    }

    let tail = input[start..].trim();
    if !tail.is_empty() {
        games.push(tail);
    }
    games.into_iter().filter(|g| !g.is_empty()).collect()
}

fn split_sections(input: &str) -> (&str, &str) {
    match input.find("\n\n") {
        Some(idx) => (&input[..idx], &input[idx + 2..]),
        None => {
            // No blank-line separator; treat trailing non-tag lines as movetext.
            match input.lines().position(|l| !l.trim_start().starts_with('[') && !l.trim().is_empty()) {
                Some(pos) => {
                    let split_at = input
                        .lines()
                        .take(pos)
                        .map(|l| l.len() + 1)
                        .sum();
                    (&input[..split_at], &input[split_at..])
                }
                None => (input, ""),
            }
        }
    }
}

fn parse_tags(section: &str) -> Result<HashMap<String, String>, PgnError> {
    let mut tags = HashMap::new();
    for line in section.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line = line
            .strip_prefix('[')
            .and_then(|l| l.strip_suffix(']'))
            .ok_or_else(|| PgnError::InvalidTag(line.to_string()))?;
        let (key, rest) = line
            .split_once(' ')
            .ok_or_else(|| PgnError::InvalidTag(line.to_string()))?;
        let value = rest.trim().trim_matches('"');
        tags.insert(key.to_string(), value.to_string());
    }
    Ok(tags)
}

enum Token {
    San(String),
    Comment(String),
    Nag(u8),
    Result(GameResult),
}

fn movetext_tokens(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '{' {
            chars.next();
            let mut comment = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                comment.push(c);
            }
            tokens.push(Token::Comment(comment.trim().to_string()));
            continue;
        }
        if c == '$' {
            chars.next();
            let mut digits = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if let Ok(n) = digits.parse() {
                tokens.push(Token::Nag(n));
            }
            continue;
        }
        // Consume a whitespace-delimited word: move number, SAN, or result.
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '{' || c == '$' {
                break;
            }
            word.push(c);
            chars.next();
        }
        if word.is_empty() {
            continue;
        }
        if let Some(result) = GameResult::parse(&word) {
            tokens.push(Token::Result(result));
            continue;
        }
        // Move-number markers like "1." or "12..." carry no move information.
        let is_move_number = word.contains('.') && word.chars().all(|c| c.is_ascii_digit() || c == '.');
        if is_move_number {
            continue;
        }
        tokens.push(Token::San(word));
    }

    tokens
}

#[derive(Debug, thiserror::Error)]
pub enum PgnError {
    #[error("invalid PGN tag: {0}")]
    InvalidTag(String),
    #[error("invalid FEN tag: {0}")]
    InvalidFen(String),
    #[error("SAN parse error: {0}")]
    SanError(#[from] super::san::SanError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_and_moves() {
        let pgn = "[Event \"Test\"]\n[White \"Alice\"]\n[Black \"Bob\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0";
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.tags.get("White").unwrap(), "Alice");
        assert_eq!(game.moves.len(), 4);
        assert_eq!(game.moves[0].san, "e4");
        assert_eq!(game.result, GameResult::WhiteWins);
    }

    #[test]
    fn parses_comments_and_nags() {
        let pgn = "[Event \"Test\"]\n\n1. e4 {best by test} $1 e5 *";
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.moves[0].comment.as_deref(), Some("best by test"));
        assert_eq!(game.moves[0].nags, vec![1]);
    }

    #[test]
    fn parses_multiple_games() {
        let pgn = "[Event \"A\"]\n\n1. e4 e5 1-0\n\n[Event \"B\"]\n\n1. d4 d5 0-1";
        let games = parse_pgn_games(pgn).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].tags.get("Event").unwrap(), "A");
        assert_eq!(games[1].tags.get("Event").unwrap(), "B");
    }
}
