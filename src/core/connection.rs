//! Player connection handle
//! Outbound lines go through a channel drained by the connection's writer task

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::{trace, warn};
use tokio::sync::mpsc;

use crate::core::message_types::PlayerId;

/// Output side of a single player's socket
#[derive(Debug, Clone)]
pub struct Connection {
    pub player_id: PlayerId,
    pub sender: mpsc::UnboundedSender<String>,
    pub peer_addr: Option<SocketAddr>,
    pub connected_at: Instant,
}

impl Connection {
    pub fn new(
        player_id: PlayerId,
        sender: mpsc::UnboundedSender<String>,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            player_id,
            sender,
            peer_addr,
            connected_at: Instant::now(),
        }
    }

    /// Queue one line for the writer task
    pub fn send_line(&self, line: &str) -> bool {
        match self.sender.send(line.to_string()) {
            Ok(_) => {
                trace!("-> PLAYER-{}: {}", self.player_id, line);
                true
            }
            Err(_) => {
                warn!("Failed to send message to PLAYER-{}", self.player_id);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
