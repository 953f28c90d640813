//! The mate-tree expander — the hard part.

use std::collections::HashMap;

use cozy_chess::Board;

use crate::equivalence::filter_equivalent;
use crate::model::{EngineLine, Turn};

/// Minimal engine surface the expander needs: set a position, then search
/// it to a fixed depth under a set of flags. Implemented by
/// `engine::EngineSession` in production and by an in-memory stub in tests.
pub trait MateSearch {
    type Error: std::error::Error + Send + Sync + 'static;
    type Flags: Copy;

    fn set_position(
        &mut self,
        fen: &str,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send;

    fn search(
        &mut self,
        depth: u32,
        flags: Self::Flags,
    ) -> impl std::future::Future<Output = Result<Vec<EngineLine>, Self::Error>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ExpandError<E: std::error::Error + Send + Sync + 'static> {
    #[error("engine error during mate-tree expansion: {0}")]
    Engine(#[from] E),
}

/// Continuation lists already computed for a defender-side position,
/// shared across every parent branch that transposes into it.
pub type Memo = HashMap<String, Vec<Turn>>;

/// Expand a candidate engine line at `board` into a Turn, or `None` if the
/// line isn't a usable forced mate.
///
/// `board` is the attacker-to-move position `L` was computed against; it is
/// never mutated (each recursive call clones forward).
pub async fn expand<S: MateSearch>(
    board: &Board,
    engine: &mut S,
    line: &EngineLine,
    flags: S::Flags,
    memo: &mut Memo,
) -> Result<Option<Turn>, ExpandError<S::Error>> {
    if !line.is_mate || line.score < 1 {
        return Ok(None);
    }

    let Some(m1) = line.first_move() else {
        return Ok(None);
    };
    let m1_san = chess::pgn::san::format_san(board, m1);

    if line.score == 1 {
        return Ok(Some(Turn::leaf(m1_san)));
    }

    let mut after_m1 = board.clone();
    after_m1.play_unchecked(m1);

    let m2 = match line.second_move() {
        Some(mv) => mv,
        None => {
            engine.set_position(&after_m1.to_string()).await?;
            let lines = engine.search(line.score as u32, flags).await?;
            let Some(reply_line) = lines.first() else {
                return Ok(None);
            };
            let Some(mv) = reply_line.first_move() else {
                return Ok(None);
            };
            mv
        }
    };
    let m2_san = chess::pgn::san::format_san(&after_m1, m2);

    let mut after_m2 = after_m1.clone();
    after_m2.play_unchecked(m2);
    let key = after_m2.to_string();

    let continuations = if let Some(cached) = memo.get(&key) {
        cached.clone()
    } else {
        engine.set_position(&key).await?;
        let lines = engine.search(line.score as u32, flags).await?;
        let candidates = filter_equivalent(lines);

        let mut continuations = Vec::new();
        for candidate in &candidates {
            if let Some(turn) = Box::pin(expand(&after_m2, engine, candidate, flags, memo)).await?
            {
                continuations.push(turn);
            }
        }
        memo.insert(key, continuations.clone());
        continuations
    };

    if continuations.is_empty() {
        return Ok(None);
    }

    Ok(Some(Turn::branch(m1_san, m2_san, continuations)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::{Board, File, Move, Rank, Square};
    use std::collections::HashMap as StdHashMap;

    #[derive(Clone, Copy)]
    struct NoFlags;

    /// An in-memory engine keyed by FEN, returning pre-scripted lines.
    struct StubEngine {
        responses: StdHashMap<String, Vec<EngineLine>>,
        current_fen: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("no scripted response for position")]
    struct StubError;

    impl MateSearch for StubEngine {
        type Error = StubError;
        type Flags = NoFlags;

        async fn set_position(&mut self, fen: &str) -> Result<(), Self::Error> {
            self.current_fen = fen.to_string();
            Ok(())
        }

        async fn search(&mut self, _depth: u32, _flags: NoFlags) -> Result<Vec<EngineLine>, Self::Error> {
            self.responses
                .get(&self.current_fen)
                .cloned()
                .ok_or(StubError)
        }
    }

    fn mv(from: (File, Rank), to: (File, Rank)) -> Move {
        Move {
            from: Square::new(from.0, from.1),
            to: Square::new(to.0, to.1),
            promotion: None,
        }
    }

    #[tokio::test]
    async fn one_move_mate_is_a_leaf() {
        // Back-rank mate: black king boxed in by its own pawns, white rook
        // swings to the open file and delivers Ra8#.
        let board: Board = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1".parse().unwrap();
        let line = EngineLine {
            is_mate: true,
            score: 1,
            best_moves: vec![mv((File::A, Rank::First), (File::A, Rank::Eighth))],
        };
        let mut engine = StubEngine {
            responses: StdHashMap::new(),
            current_fen: String::new(),
        };
        let mut memo = Memo::new();
        let turn = expand(&board, &mut engine, &line, NoFlags, &mut memo)
            .await
            .unwrap()
            .unwrap();
        assert!(turn.is_last);
        assert_eq!(turn.san, "Ra8#");
    }

    #[tokio::test]
    async fn non_mate_line_expands_to_nothing() {
        let board = Board::default();
        let line = EngineLine {
            is_mate: false,
            score: 50,
            best_moves: vec![mv((File::E, Rank::Second), (File::E, Rank::Fourth))],
        };
        let mut engine = StubEngine {
            responses: StdHashMap::new(),
            current_fen: String::new(),
        };
        let mut memo = Memo::new();
        let turn = expand(&board, &mut engine, &line, NoFlags, &mut memo)
            .await
            .unwrap();
        assert!(turn.is_none());
    }

    #[tokio::test]
    async fn mate_in_two_with_a_single_line_queries_the_defender_reply() {
        // A spare pair of pawns (b2/b7) shuffle back and forth while the
        // real mating net (rook a1, king g1, boxed black king on g8) sits
        // untouched, so the final move is the same Ra8# as the leaf case.
        let board: Board = "6k1/1p3ppp/8/8/8/8/1P6/R5K1 w - - 0 1".parse().unwrap();
        let m1 = mv((File::B, Rank::Second), (File::B, Rank::Third));
        let reply = mv((File::B, Rank::Seventh), (File::B, Rank::Sixth));
        let mate = mv((File::A, Rank::First), (File::A, Rank::Eighth));

        let mut after_m1 = board.clone();
        after_m1.play_unchecked(m1);
        let mut after_m2 = after_m1.clone();
        after_m2.play_unchecked(reply);

        let mut responses = StdHashMap::new();
        responses.insert(
            after_m1.to_string(),
            vec![EngineLine {
                is_mate: false,
                score: 0,
                best_moves: vec![reply],
            }],
        );
        responses.insert(
            after_m2.to_string(),
            vec![EngineLine {
                is_mate: true,
                score: 1,
                best_moves: vec![mate],
            }],
        );

        let line = EngineLine {
            is_mate: true,
            score: 2,
            best_moves: vec![m1],
        };
        let mut engine = StubEngine {
            responses,
            current_fen: String::new(),
        };
        let mut memo = Memo::new();
        let turn = expand(&board, &mut engine, &line, NoFlags, &mut memo)
            .await
            .unwrap()
            .unwrap();

        assert!(!turn.is_last);
        assert_eq!(turn.san, "b3");
        assert_eq!(turn.reply_san, "b6");
        assert_eq!(turn.continuations.len(), 1);
        assert!(turn.continuations[0].is_last);
        assert_eq!(turn.continuations[0].san, "Ra8#");
    }

    /// Counts `search` calls per position so a test can prove the memo
    /// spared a transposed position a second engine query.
    struct CountingStubEngine {
        responses: StdHashMap<String, Vec<EngineLine>>,
        current_fen: String,
        call_counts: std::cell::RefCell<StdHashMap<String, u32>>,
    }

    impl MateSearch for CountingStubEngine {
        type Error = StubError;
        type Flags = NoFlags;

        async fn set_position(&mut self, fen: &str) -> Result<(), Self::Error> {
            self.current_fen = fen.to_string();
            Ok(())
        }

        async fn search(&mut self, _depth: u32, _flags: NoFlags) -> Result<Vec<EngineLine>, Self::Error> {
            *self
                .call_counts
                .borrow_mut()
                .entry(self.current_fen.clone())
                .or_insert(0) += 1;
            self.responses.get(&self.current_fen).cloned().ok_or(StubError)
        }
    }

    #[tokio::test]
    async fn transposing_first_moves_share_one_continuation_lookup() {
        use cozy_chess::Piece;

        // A lone pawn on e7 can promote to either a queen or a rook; either
        // way the black rook on a8 recaptures it on e8, landing on the same
        // final position regardless of which promotion white chose.
        let board: Board = "r6k/4P3/8/8/8/8/8/K7 w - - 0 1".parse().unwrap();
        let queen_promo = Move {
            from: Square::new(File::E, Rank::Seventh),
            to: Square::new(File::E, Rank::Eighth),
            promotion: Some(Piece::Queen),
        };
        let rook_promo = Move {
            from: Square::new(File::E, Rank::Seventh),
            to: Square::new(File::E, Rank::Eighth),
            promotion: Some(Piece::Rook),
        };
        let recapture = mv((File::A, Rank::Eighth), (File::E, Rank::Eighth));
        let mate_move = mv((File::A, Rank::First), (File::B, Rank::First));

        let mut after_queen = board.clone();
        after_queen.play_unchecked(queen_promo);
        let mut after_rook = board.clone();
        after_rook.play_unchecked(rook_promo);

        let mut shared = after_queen.clone();
        shared.play_unchecked(recapture);
        let mut shared_via_rook = after_rook.clone();
        shared_via_rook.play_unchecked(recapture);
        assert_eq!(shared.to_string(), shared_via_rook.to_string());
        let shared_key = shared.to_string();

        let mut responses = StdHashMap::new();
        responses.insert(
            after_queen.to_string(),
            vec![EngineLine {
                is_mate: false,
                score: 0,
                best_moves: vec![recapture],
            }],
        );
        responses.insert(
            after_rook.to_string(),
            vec![EngineLine {
                is_mate: false,
                score: 0,
                best_moves: vec![recapture],
            }],
        );
        responses.insert(
            shared_key.clone(),
            vec![EngineLine {
                is_mate: true,
                score: 1,
                best_moves: vec![mate_move],
            }],
        );

        let line_a = EngineLine {
            is_mate: true,
            score: 2,
            best_moves: vec![queen_promo],
        };
        let line_b = EngineLine {
            is_mate: true,
            score: 2,
            best_moves: vec![rook_promo],
        };

        let mut engine = CountingStubEngine {
            responses,
            current_fen: String::new(),
            call_counts: std::cell::RefCell::new(StdHashMap::new()),
        };
        let mut memo = Memo::new();

        let turn_a = expand(&board, &mut engine, &line_a, NoFlags, &mut memo)
            .await
            .unwrap()
            .unwrap();
        let turn_b = expand(&board, &mut engine, &line_b, NoFlags, &mut memo)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(turn_a.continuations, turn_b.continuations);
        assert_eq!(*engine.call_counts.borrow().get(&shared_key).unwrap(), 1);
    }
}
