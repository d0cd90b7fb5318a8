//! Server and client configuration
//! Values come from the environment, falling back to the protocol defaults

use crate::constants::{
    DEFAULT_ADMISSION_PAUSE_MS, DEFAULT_CLIENT_HOST, DEFAULT_HOST, DEFAULT_MAX_PLAYERS,
    DEFAULT_MAX_ROUND, DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY, MAX_PLAYERS_LIMIT, MAX_ROUND_LIMIT,
};
use crate::error::{Result, YahtzeeError};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Rounds per game
    pub max_round: u32,
    /// Seat limit, also the worker pool size
    pub max_players: usize,
    /// Sockets that may wait for a seat before accepting blocks
    pub queue_capacity: usize,
    /// Pause after each admission
    pub admission_pause: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_round: DEFAULT_MAX_ROUND,
            max_players: DEFAULT_MAX_PLAYERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            admission_pause: Duration::from_millis(DEFAULT_ADMISSION_PAUSE_MS),
        }
    }
}

/// Parse an optional environment variable, rejecting unparsable values
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| YahtzeeError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env::var("YAHTZEE_HOST").unwrap_or(defaults.host);
        let port = env_parse("YAHTZEE_PORT")?.unwrap_or(defaults.port);
        let max_round = env_parse("YAHTZEE_MAX_ROUND")?.unwrap_or(defaults.max_round);
        let max_players = env_parse("YAHTZEE_MAX_PLAYERS")?.unwrap_or(defaults.max_players);
        let queue_capacity =
            env_parse("YAHTZEE_QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity);
        let admission_pause = env_parse("YAHTZEE_ADMISSION_PAUSE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.admission_pause);

        let config = Self {
            host,
            port,
            max_round,
            max_players,
            queue_capacity,
            admission_pause,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ROUND_LIMIT).contains(&self.max_round) {
            return Err(YahtzeeError::Config(format!(
                "Round number should be between 1 and {}, got {}",
                MAX_ROUND_LIMIT, self.max_round
            )));
        }
        if !(1..=MAX_PLAYERS_LIMIT).contains(&self.max_players) {
            return Err(YahtzeeError::Config(format!(
                "Player number should be between 1 and {}, got {}",
                MAX_PLAYERS_LIMIT, self.max_players
            )));
        }
        if self.queue_capacity == 0 {
            return Err(YahtzeeError::Config(
                "Admission queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Client connection parameters
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CLIENT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env::var("YAHTZEE_HOST").unwrap_or(defaults.host),
            port: env_parse("YAHTZEE_PORT")?.unwrap_or(defaults.port),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
