//! `GET /api/tv/feed` client: a line-delimited JSON stream of `featured`/
//! `fen` messages.

use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use super::UpstreamError;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum LiveMessage {
    #[serde(rename = "featured")]
    Featured(FeaturedPayload),
    #[serde(rename = "fen")]
    Fen(FenPayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturedPayload {
    pub id: String,
    pub orientation: String,
    pub players: Vec<PlayerInfo>,
    pub fen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerInfo {
    pub color: String,
    pub user: PlayerUser,
    pub rating: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerUser {
    pub name: String,
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FenPayload {
    pub fen: String,
    pub lm: Option<String>,
    pub wc: Option<i64>,
    pub bc: Option<i64>,
}

/// The live feed's `fen` payload is a short FEN (board + side to move only);
/// fill in the invariant castling/en-passant/clock suffix when it's missing.
pub fn normalize_fen(fen: &str) -> String {
    if fen.split_whitespace().count() >= 6 {
        fen.to_string()
    } else {
        format!("{fen} - - 0 1")
    }
}

/// Open the feed and yield each decoded message as it arrives. An unknown
/// message kind, a network error, or a transport close all end the stream
/// with an error; the caller reconnects by calling this again.
pub async fn open_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<impl Stream<Item = Result<LiveMessage, UpstreamError>>, UpstreamError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let byte_stream = response.bytes_stream();

    Ok(async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut buf = String::new();
        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(UpstreamError::Network(e));
                    return;
                }
            };
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim().to_string();
                buf.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<LiveMessage>(&line) {
                    Ok(message) => yield Ok(message),
                    Err(e) => {
                        yield Err(UpstreamError::Json(e));
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_fen_gains_the_invariant_suffix() {
        let fen = "8/8/8/8/8/8/8/8 w";
        assert_eq!(normalize_fen(fen), "8/8/8/8/8/8/8/8 w - - 0 1");
    }

    #[test]
    fn full_fen_is_left_alone() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        assert_eq!(normalize_fen(fen), fen);
    }

    #[test]
    fn parses_featured_message() {
        let json = r#"{"t":"featured","d":{"id":"g1","orientation":"white","players":[
            {"color":"white","user":{"name":"alice","id":"u1","title":null},"rating":2400},
            {"color":"black","user":{"name":"bob","id":"u2","title":"GM"},"rating":2450}
        ],"fen":"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"}}"#;
        let message: LiveMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(message, LiveMessage::Featured(_)));
    }

    #[test]
    fn parses_fen_message() {
        let json = r#"{"t":"fen","d":{"fen":"8/8/8/8/8/8/8/8 w","lm":"e2e4","wc":60,"bc":60}}"#;
        let message: LiveMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(message, LiveMessage::Fen(_)));
    }

    #[test]
    fn unknown_message_kind_fails_to_parse() {
        let json = r#"{"t":"bogus","d":{}}"#;
        assert!(serde_json::from_str::<LiveMessage>(json).is_err());
    }
}
