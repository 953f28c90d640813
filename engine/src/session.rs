//! A single owned engine subprocess speaking the UCI line protocol.
//!
//! `EngineSession` serialises one request/response pair at a time: `search`
//! blocks until the engine emits `bestmove`, then returns every MultiPV line
//! collected along the way, ranked by the engine's own preference order.

use std::process::Stdio;

use chess_common::uci::{format_long_move, parse_long_move};
use cozy_chess::Move;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

/// Configuration applied once at session construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub multi_pv: u8,
    pub hash_mb: u32,
    pub own_book: bool,
    pub ponder: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            multi_pv: 6,
            hash_mb: 128,
            own_book: true,
            ponder: false,
        }
    }
}

/// Which info lines to keep when collecting a search's results.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFlags {
    /// Keep `upperbound`/`lowerbound` info lines in addition to exact
    /// scores. A re-query at a shallower depth than the engine's own
    /// iterative-deepening schedule often only produces bound scores for
    /// some MultiPV slots; without this flag those slots are dropped.
    pub include_bounds: bool,
}

/// A single MultiPV ranked line from a completed search.
#[derive(Debug, Clone)]
pub struct EngineLine {
    pub multipv: u8,
    pub score: LineScore,
    pub best_moves: Vec<Move>,
}

impl EngineLine {
    pub fn is_mate(&self) -> bool {
        matches!(self.score, LineScore::Mate(_))
    }

    /// Mate distance in plies from the side to move, or `None` if this line
    /// isn't a mate line.
    pub fn mate_plies(&self) -> Option<i32> {
        match self.score {
            LineScore::Mate(m) => Some(m),
            LineScore::Centipawns(_) => None,
        }
    }

    pub fn centipawns(&self) -> Option<i32> {
        match self.score {
            LineScore::Centipawns(cp) => Some(cp),
            LineScore::Mate(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineScore {
    Centipawns(i32),
    /// Plies to mate; negative means the side to move is being mated.
    Mate(i32),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(std::io::Error),
    #[error("engine has no stdin/stdout pipe")]
    MissingPipe,
    #[error("engine io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine exited before responding")]
    EngineExited,
    #[error("engine rejected position: {0}")]
    InvalidPosition(String),
    #[error("timed out waiting for engine response")]
    Timeout,
    #[error("malformed engine output: {0}")]
    MalformedOutput(String),
}

/// Owns one engine subprocess. Not `Clone`; callers share it behind a
/// `tokio::sync::Mutex` to honor the single-pending-search contract.
pub struct EngineSession {
    process: Child,
    stdin: ChildStdin,
    lines_rx: mpsc::Receiver<String>,
    current_fen: Option<String>,
}

impl EngineSession {
    #[tracing::instrument(level = "info", skip(args))]
    pub async fn spawn(
        path: &str,
        args: &[String],
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut process = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(SessionError::Spawn)?;

        let mut stdin = process.stdin.take().ok_or(SessionError::MissingPipe)?;
        let stdout = process.stdout.take().ok_or(SessionError::MissingPipe)?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let trimmed = line.trim().to_string();
                        tracing::trace!(engine_out = %trimmed, "engine output");
                        if tx.send(trimmed).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("engine stdout reader exiting");
        });

        let mut session = Self {
            process,
            stdin,
            lines_rx: rx,
            current_fen: None,
        };

        session.write_line("uci").await?;
        session.wait_for(|l| l == "uciok").await?;

        session
            .write_line(&format!(
                "setoption name MultiPV value {}",
                config.multi_pv
            ))
            .await?;
        session
            .write_line(&format!("setoption name Hash value {}", config.hash_mb))
            .await?;
        session
            .write_line(&format!(
                "setoption name Ponder value {}",
                config.ponder
            ))
            .await?;
        session
            .write_line(&format!(
                "setoption name OwnBook value {}",
                config.own_book
            ))
            .await?;

        session.write_line("isready").await?;
        session.wait_for(|l| l == "readyok").await?;

        Ok(session)
    }

    /// Set the position to analyze from. Fails only if the engine can't be
    /// reached; a malformed FEN is rejected by the caller before this point
    /// since the engine protocol itself doesn't echo a parse error.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_position(&mut self, fen: &str) -> Result<(), SessionError> {
        if fen.split_whitespace().count() < 4 {
            return Err(SessionError::InvalidPosition(fen.to_string()));
        }
        self.write_line(&format!("position fen {}", fen)).await?;
        self.current_fen = Some(fen.to_string());
        Ok(())
    }

    /// Search the current position to `depth`, returning up to `MultiPV`
    /// ranked lines. The session must already have a position set.
    #[tracing::instrument(level = "debug", skip(self, flags))]
    pub async fn search(
        &mut self,
        depth: u32,
        flags: SearchFlags,
    ) -> Result<Vec<EngineLine>, SessionError> {
        if self.current_fen.is_none() {
            return Err(SessionError::InvalidPosition(
                "no position set before search".to_string(),
            ));
        }

        self.write_line(&format!("go depth {}", depth)).await?;

        let mut by_multipv: std::collections::BTreeMap<u8, EngineLine> =
            std::collections::BTreeMap::new();

        loop {
            let line = self
                .lines_rx
                .recv()
                .await
                .ok_or(SessionError::EngineExited)?;

            if line.starts_with("bestmove") {
                break;
            }
            if !line.starts_with("info") {
                continue;
            }
            if let Some(parsed) = parse_info_line(&line, flags) {
                by_multipv.insert(parsed.multipv, parsed);
            }
        }

        Ok(by_multipv.into_values().collect())
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        tracing::trace!(engine_in = %line, "engine input");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn wait_for(&mut self, pred: impl Fn(&str) -> bool) -> Result<(), SessionError> {
        let deadline = tokio::time::Duration::from_secs(10);
        tokio::time::timeout(deadline, async {
            loop {
                let line = self
                    .lines_rx
                    .recv()
                    .await
                    .ok_or(SessionError::EngineExited)?;
                if pred(&line) {
                    return Ok(());
                }
            }
        })
        .await
        .map_err(|_| SessionError::Timeout)?
    }

    pub async fn shutdown(mut self) {
        let _ = self.write_line("quit").await;
        let _ =
            tokio::time::timeout(std::time::Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}

fn parse_info_line(line: &str, flags: SearchFlags) -> Option<EngineLine> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut multipv = 1u8;
    let mut score = None;
    let mut pv = Vec::new();
    let mut bound = false;
    let mut i = 1;

    while i < tokens.len() {
        match tokens[i] {
            "multipv" => {
                i += 1;
                multipv = tokens.get(i).and_then(|s| s.parse().ok()).unwrap_or(1);
            }
            "score" => {
                i += 1;
                let kind = tokens.get(i).copied();
                i += 1;
                let value: i32 = tokens.get(i).and_then(|s| s.parse().ok())?;
                score = match kind {
                    Some("cp") => Some(LineScore::Centipawns(value)),
                    Some("mate") => Some(LineScore::Mate(value)),
                    _ => None,
                };
            }
            "upperbound" | "lowerbound" => {
                bound = true;
            }
            "pv" => {
                i += 1;
                while i < tokens.len() {
                    match parse_long_move(tokens[i]) {
                        Ok(mv) => pv.push(mv),
                        Err(_) => break,
                    }
                    i += 1;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    if bound && !flags.include_bounds {
        return None;
    }

    let score = score?;
    if pv.is_empty() {
        return None;
    }

    Some(EngineLine {
        multipv,
        score,
        best_moves: pv,
    })
}

/// Re-export the long-coordinate formatter so callers building `go`/`position`
/// command strings elsewhere in this crate use the same codec.
pub fn format_move(mv: Move) -> String {
    format_long_move(mv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cp_line_without_bound() {
        let line = "info depth 10 multipv 1 score cp 35 nodes 1000 pv e2e4 e7e5";
        let parsed = parse_info_line(line, SearchFlags::default()).unwrap();
        assert_eq!(parsed.multipv, 1);
        assert_eq!(parsed.centipawns(), Some(35));
        assert_eq!(parsed.best_moves.len(), 2);
    }

    #[test]
    fn drops_bound_lines_unless_requested() {
        let line = "info depth 10 multipv 2 score cp 10 upperbound pv e2e4";
        assert!(parse_info_line(line, SearchFlags::default()).is_none());
        assert!(parse_info_line(
            line,
            SearchFlags {
                include_bounds: true
            }
        )
        .is_some());
    }

    #[test]
    fn parses_mate_line() {
        let line = "info depth 3 multipv 1 score mate 2 pv h5f7 e8e7 f7e7";
        let parsed = parse_info_line(line, SearchFlags::default()).unwrap();
        assert!(parsed.is_mate());
        assert_eq!(parsed.mate_plies(), Some(2));
    }

    #[test]
    fn ignores_lines_missing_score_or_pv() {
        let line = "info depth 10 nodes 500";
        assert!(parse_info_line(line, SearchFlags::default()).is_none());
    }
}
