//! Line-equivalence filtering: sort candidate lines mates-first/shallower-
//! first/score-descending, then keep only the lines equivalent to the
//! resulting head.

use std::cmp::Ordering;

use crate::model::EngineLine;

/// Sort `lines` per the ordering rule, then keep only those equivalent to
/// the head. Returns an empty vec if `lines` was empty.
pub fn filter_equivalent(mut lines: Vec<EngineLine>) -> Vec<EngineLine> {
    lines.sort_by(order_lines);
    let Some(base) = lines.first().cloned() else {
        return lines;
    };
    lines.retain(|candidate| is_equivalent(&base, candidate));
    lines
}

fn order_lines(a: &EngineLine, b: &EngineLine) -> Ordering {
    match (a.is_mate, b.is_mate) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a.score.cmp(&b.score),
        (false, false) => b.score.cmp(&a.score),
    }
}

fn is_equivalent(base: &EngineLine, candidate: &EngineLine) -> bool {
    if base.is_mate {
        candidate.is_mate && candidate.score == base.score
    } else {
        !candidate.is_mate && base.score - candidate.score <= 50
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::{File, Rank, Square};

    fn line(is_mate: bool, score: i32) -> EngineLine {
        let mv = cozy_chess::Move {
            from: Square::new(File::E, Rank::Second),
            to: Square::new(File::E, Rank::Fourth),
            promotion: None,
        };
        EngineLine {
            is_mate,
            score,
            best_moves: vec![mv],
        }
    }

    #[test]
    fn mate_lines_beat_non_mate_regardless_of_score() {
        let lines = vec![line(false, 900), line(true, 3)];
        let kept = filter_equivalent(lines);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].is_mate);
    }

    #[test]
    fn keeps_only_same_mate_distance() {
        let lines = vec![line(true, 2), line(true, 2), line(true, 4)];
        let kept = filter_equivalent(lines);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|l| l.score == 2));
    }

    #[test]
    fn keeps_non_mate_lines_within_fifty_centipawns() {
        let lines = vec![line(false, 300), line(false, 270), line(false, 100)];
        let kept = filter_equivalent(lines);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|l| l.score >= 250));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(filter_equivalent(Vec::new()).is_empty());
    }
}
