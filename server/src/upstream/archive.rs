//! `GET /api/games/user/{name}` client and the three-per-game reconciliation
//! quirk.

use chess::pgn::PgnGame;

use super::UpstreamError;

/// Fetch up to `max` games for `user`, optionally time-filtered, and
/// reconcile the upstream's three-PGN-entries-per-real-game quirk: entries
/// at index `i mod 3 == 1` are discarded; entries at `i mod 3 == 2` inherit
/// any tag pairs missing from the entry immediately before them.
pub async fn fetch_games(
    client: &reqwest::Client,
    base_url: &str,
    user: &str,
    max: u32,
    since_ms: Option<i64>,
    until_ms: Option<i64>,
) -> Result<Vec<PgnGame>, UpstreamError> {
    let mut url = format!("{base_url}/api/games/user/{user}?max={max}");
    if let Some(since) = since_ms {
        url.push_str(&format!("&since={since}"));
    }
    if let Some(until) = until_ms {
        url.push_str(&format!("&until={until}"));
    }

    let response = client.get(&url).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(UpstreamError::UserNotFound(user.to_string()));
    }
    let body = response.error_for_status()?.text().await?;

    let entries = chess::pgn::parse_pgn_games(&body)?;
    Ok(reconcile_three_per_game(entries))
}

fn reconcile_three_per_game(entries: Vec<PgnGame>) -> Vec<PgnGame> {
    let mut games = Vec::with_capacity(entries.len() / 3);
    let mut idx = 0;
    while idx + 2 < entries.len() {
        let predecessor = &entries[idx + 1];
        let mut merged = entries[idx + 2].clone();
        for (key, value) in &predecessor.tags {
            merged.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
        games.push(merged);
        idx += 3;
    }
    games
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(tags: &[(&str, &str)]) -> PgnGame {
        PgnGame {
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            moves: vec![],
            result: chess::pgn::GameResult::Ongoing,
        }
    }

    #[test]
    fn keeps_every_third_entry_merging_its_predecessors_tags() {
        let entries = vec![
            game(&[("White", "alice")]),                 // headers-only, index 0, dropped
            game(&[("Black", "bob")]),                    // moves-only, index 1, tag source
            game(&[("White", "alice"), ("Result", "1-0")]), // merged, index 2, kept
        ];
        let games = reconcile_three_per_game(entries);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].tags.get("White").map(String::as_str), Some("alice"));
        assert_eq!(games[0].tags.get("Black").map(String::as_str), Some("bob"));
        assert_eq!(games[0].tags.get("Result").map(String::as_str), Some("1-0"));
    }

    #[test]
    fn kept_entrys_own_tags_win_over_inherited_ones() {
        let entries = vec![
            game(&[]),
            game(&[("White", "from-predecessor")]),
            game(&[("White", "own-value")]),
        ];
        let games = reconcile_three_per_game(entries);
        assert_eq!(games[0].tags.get("White").map(String::as_str), Some("own-value"));
    }

    #[test]
    fn incomplete_trailing_group_is_dropped() {
        let entries = vec![game(&[]), game(&[])];
        assert!(reconcile_three_per_game(entries).is_empty());
    }

    #[test]
    fn empty_input_yields_no_games() {
        assert!(reconcile_three_per_game(vec![]).is_empty());
    }
}
