//! Difficulty (ELO) estimation.

use crate::model::Turn;

/// K-factor coefficient by rating band, mirroring standard Elo rating
/// updates: stronger players get smaller adjustments.
fn k_factor(rating: i32) -> i32 {
    if rating < 2000 {
        40
    } else if rating < 2400 {
        20
    } else {
        10
    }
}

/// Walk `branch` in lockstep with the moves actually played (attacker and
/// defender moves interleaved, attacker first), counting matches until the
/// first divergence or the branch is exhausted.
///
/// If the branch's own first move wasn't played, nothing matched: `(0,
/// branch.min_remaining_depth())`.
fn walk(branch: &Turn, played: &[String]) -> (u32, u32) {
    if played.first().map(String::as_str) != Some(branch.san.as_str()) {
        return (0, branch.min_remaining_depth());
    }

    let mut node = branch;
    let mut matched = 1u32;
    let mut rest = &played[1..];

    loop {
        // The played sequence alternates attacker/defender; `rest[0]` is the
        // forced defender reply (not a decision point), `rest[1]` is the
        // next attacker move to check against this node's continuations.
        if node.is_last || rest.len() < 2 {
            break;
        }
        let next_attacker = &rest[1];
        let Some(child) = node.continuations.iter().find(|t| &t.san == next_attacker) else {
            break;
        };
        node = child;
        matched += 1;
        rest = &rest[2..];
    }

    (matched, node.min_remaining_depth())
}

/// Estimate the target rating for a single first-move branch, given the
/// moves actually played from the puzzle position onward (attacker and
/// defender moves interleaved, attacker first) and the player's rating.
pub fn estimate_branch_elo(branch: &Turn, played_from_puzzle: &[String], player_rating: i32) -> i32 {
    let (matched, remaining_depth) = walk(branch, played_from_puzzle);
    let percent = matched as f64 / (matched + remaining_depth) as f64;
    let k = k_factor(player_rating) as f64;
    player_rating + (k * (percent - 0.5)).round() as i32
}

/// The puzzle's `target_elo`: the maximum estimate across every first-move
/// branch, since any branch the player could have found makes the puzzle
/// solvable at that difficulty.
pub fn estimate_target_elo(first_turns: &[Turn], played_from_puzzle: &[String], player_rating: i32) -> i32 {
    first_turns
        .iter()
        .map(|branch| estimate_branch_elo(branch, played_from_puzzle, player_rating))
        .max()
        .unwrap_or(player_rating)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(san: &str) -> Turn {
        Turn::leaf(san.to_string())
    }

    #[test]
    fn unmatched_move_yields_minimum_percent() {
        let branch = Turn::branch("Qh5".into(), "g6".into(), vec![leaf("Qxf7#")]);
        let played = vec!["Nc3".to_string()]; // doesn't match branch's first move
        let elo = estimate_branch_elo(&branch, &played, 1500);
        // percent = 0/(0+2) = 0 -> elo = 1500 + round(40*(0-0.5)) = 1500-20
        assert_eq!(elo, 1480);
    }

    #[test]
    fn full_match_raises_estimate_above_base_rating() {
        let branch = Turn::branch("Qh5".into(), "g6".into(), vec![leaf("Qxf7#")]);
        let played = vec!["Qh5".to_string(), "g6".to_string(), "Qxf7#".to_string()];
        let elo = estimate_branch_elo(&branch, &played, 1500);
        assert!(elo > 1500);
    }

    #[test]
    fn target_elo_takes_the_max_across_branches() {
        let easy = Turn::branch("Qh5".into(), "g6".into(), vec![leaf("Qxf7#")]);
        let hard = Turn::branch("Nc3".into(), "e6".into(), vec![leaf("Qxf7#")]);
        let played = vec!["Qh5".to_string(), "g6".to_string(), "Qxf7#".to_string()];
        let target = estimate_target_elo(&[easy, hard], &played, 1500);
        let matching_only = estimate_branch_elo(
            &Turn::branch("Qh5".into(), "g6".into(), vec![leaf("Qxf7#")]),
            &played,
            1500,
        );
        assert_eq!(target, matching_only);
    }

    #[test]
    fn elo_bounds_respect_k_factor() {
        for rating in [1200, 2100, 2500] {
            let branch = Turn::leaf("Qxf7#".to_string());
            let played = vec!["Qxf7#".to_string()];
            let elo = estimate_branch_elo(&branch, &played, rating);
            let k = k_factor(rating);
            assert!((elo - rating).abs() <= k / 2);
        }
    }
}
