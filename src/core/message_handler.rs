//! Inbound line handler: validation, decoding and session dispatch

use log::{debug, warn};

use crate::core::message_types::{ClientCommand, PlayerId};
use crate::core::session::{lock_session, SharedSession};
use crate::error::{ProtocolError, Result};
use crate::protocol::{client_registry, FrameRegistry};

/// Handles raw client lines for one server
#[derive(Clone)]
pub struct MessageHandler {
    session: SharedSession,
    registry: &'static FrameRegistry,
}

impl MessageHandler {
    /// Create a new message handler
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            registry: client_registry(),
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Process one line from `player_id`.
    ///
    /// Protocol errors are reported to that player as an INFO notice and
    /// the line is dropped; only a poisoned session lock is returned.
    pub fn handle_line(&self, player_id: PlayerId, line: &str) -> Result<()> {
        let mut session = lock_session(&self.session)?;
        debug!("Current state: {}", session.state_string());
        debug!("PLAYER-{} {}", player_id, line);

        let outcome = self
            .decode(line)
            .and_then(|command| session.handle_command(player_id, command));

        if let Err(e) = outcome {
            warn!("Rejected line from PLAYER-{}: {:?}", player_id, e);
            session.send_notice(player_id, &e.to_string());
        }
        Ok(())
    }

    fn decode(&self, line: &str) -> std::result::Result<ClientCommand, ProtocolError> {
        let message = self.registry.validate(line)?;
        ClientCommand::try_from(&message)
    }
}
