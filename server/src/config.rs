//! Process-environment configuration.
//!
//! Every knob is read once at startup from the environment; there is no
//! config file. Missing required variables are a fatal error at boot.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub engine_path: String,
    pub engine_args: Vec<String>,
    pub server_host: String,
    pub server_port: u16,
    pub database_path: PathBuf,
    pub multi_pv: u8,
    pub max_depth: u32,
    pub min_puzzle_mate_distance: i32,
    pub archive_worker_count: usize,
    pub upstream_archive_base_url: String,
    pub upstream_live_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            engine_path: require("ENGINE_PATH")?,
            engine_args: std::env::var("ENGINE_ARGS")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: parse_optional("SERVER_PORT", 8080)?,
            database_path: PathBuf::from(optional("DATABASE_URL", "./data/puzzles.db")),
            multi_pv: parse_optional("MULTIPV", 6)?,
            max_depth: parse_optional("MAX_DEPTH", 6)?,
            min_puzzle_mate_distance: parse_optional("MIN_PUZZLE_MATE_DISTANCE", 2)?,
            archive_worker_count: parse_optional("ARCHIVE_WORKER_COUNT", 4)?,
            upstream_archive_base_url: require("UPSTREAM_ARCHIVE_BASE_URL")?,
            upstream_live_url: require("UPSTREAM_LIVE_URL")?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_optional<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_optional_falls_back_to_default() {
        assert_eq!(parse_optional::<u8>("PUZZLE_SERVER_TEST_MISSING_VAR", 6).unwrap(), 6);
    }

    #[test]
    fn parse_optional_rejects_non_numeric_override() {
        std::env::set_var("PUZZLE_SERVER_TEST_BAD_VAR", "not-a-number");
        let result = parse_optional::<u8>("PUZZLE_SERVER_TEST_BAD_VAR", 6);
        std::env::remove_var("PUZZLE_SERVER_TEST_BAD_VAR");
        assert!(result.is_err());
    }
}
