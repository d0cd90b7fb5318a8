//! Yahtzee Net - multiplayer dice game over a line-oriented TCP protocol
//!
//! This library provides the frame validator, the acknowledgment ledger,
//! the server session and admission controller, and the client peer.

pub mod client;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod game;
pub mod handlers;
pub mod protocol;

// Re-export main components
pub use config::*;
pub use constants::*;
