use std::sync::PoisonError;

use thiserror::Error;

use crate::core::message_types::PlayerId;

/// Per-line protocol failures. Each one rejects a single line and is
/// reported to the peer that sent it; none of them closes a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("FORMAT CHECK ERROR. Invalid frame was given.")]
    UnknownFrame(String),

    #[error("FORMAT CHECK ERROR. Wrong number of payload was given.")]
    PayloadCount {
        frame: String,
        expected: Vec<usize>,
        actual: usize,
    },

    #[error("FORMAT CHECK ERROR. Wrong payload format was given.")]
    PayloadFormat { frame: String, token: String },

    #[error("Response message ID does not match.")]
    MsgIdMismatch { player_id: PlayerId, msg_id: u64 },
}

#[derive(Debug, Error)]
pub enum YahtzeeError {
    // Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Session errors
    #[error("Session lock error: {0}")]
    SessionLock(String),

    // Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // System errors
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

// Converting from PoisonError to facilitate poisoned mutex handling
impl<T> From<PoisonError<T>> for YahtzeeError {
    fn from(err: PoisonError<T>) -> Self {
        YahtzeeError::SessionLock(format!("Mutex poisoned: {}", err))
    }
}

// Generic result type for the game server and client
pub type Result<T> = std::result::Result<T, YahtzeeError>;
