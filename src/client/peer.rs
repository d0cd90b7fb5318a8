//! Client-side conversation state
//!
//! The peer decides which commands the user may send right now and keeps a
//! stack of server requests it has not answered yet. Information frames
//! replay the top of that stack so the UI can re-prompt for it.

use std::fmt;

use log::debug;
use tokio::sync::mpsc;

use crate::client::ui::ClientUi;
use crate::constants::{REJECT_NOTICE, RETRIEVE_MARKER};
use crate::core::message::ServerMessage;
use crate::core::message_types::{ClientCommand, MsgId, PlayerId, ServerFrame};
use crate::error::ProtocolError;
use crate::protocol::{client_registry, FrameRegistry};

const WELCOME_MARKER: &str = "Your name is PLAYER-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    WaitingStart,
    WaitingAck,
    Rolling,
    Scoring,
    Staying,
}

impl fmt::Display for PeerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened to one line of user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Rejected,
}

pub struct PeerSession<U: ClientUi> {
    phase: PeerPhase,
    /// Unanswered server requests, most recent last
    pending: Vec<ServerMessage>,
    player_id: Option<PlayerId>,
    game_over: bool,
    ui: U,
    outbound: mpsc::UnboundedSender<String>,
    registry: &'static FrameRegistry,
}

impl<U: ClientUi> PeerSession<U> {
    pub fn new(ui: U, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            phase: PeerPhase::WaitingAck,
            pending: Vec::new(),
            player_id: None,
            game_over: false,
            ui,
            outbound,
            registry: client_registry(),
        }
    }

    pub fn phase(&self) -> PeerPhase {
        self.phase
    }

    pub fn pending(&self) -> &[ServerMessage] {
        &self.pending
    }

    /// Our id, once the server's welcome has been seen
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    /// Show and process one line read from the server
    pub fn on_server_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.ui.show_server_message(line);
        let message = ServerMessage::parse(line)?;

        if message.frame == ServerFrame::Info {
            if let Some(id) = message
                .content
                .split(WELCOME_MARKER)
                .nth(1)
                .and_then(|rest| rest.split('.').next())
                .and_then(|id| id.parse().ok())
            {
                self.player_id = Some(id);
            }
        }

        self.process(message);
        Ok(())
    }

    fn process(&mut self, message: ServerMessage) {
        match message.frame {
            ServerFrame::StartGame => {
                self.pending.clear();
                self.phase = PeerPhase::WaitingStart;
            }
            ServerFrame::StartRound
            | ServerFrame::StartTurn
            | ServerFrame::ScoreChoiceValid
            | ServerFrame::TurnOver
            | ServerFrame::RoundOver
            | ServerFrame::GameOver => self.phase = PeerPhase::WaitingAck,
            ServerFrame::ChooseDice | ServerFrame::InvalidDiceChoice => {
                self.phase = PeerPhase::Rolling
            }
            ServerFrame::ChooseScore | ServerFrame::ScoreChoiceInvalid => {
                self.phase = PeerPhase::Scoring
            }
            ServerFrame::Info | ServerFrame::GameState | ServerFrame::Ack => self.retrieve(),
        }

        if message.frame == ServerFrame::GameOver {
            self.game_over = true;
        }
        if message.frame.is_buffered() {
            self.pending.push(message);
        }
    }

    /// Replay the newest unanswered request, unless waiting for the game to start
    fn retrieve(&mut self) {
        if self.phase == PeerPhase::WaitingStart {
            return;
        }
        if let Some(top) = self.pending.pop() {
            debug!("Replaying {} {}", top.frame, top.msg_id);
            self.ui
                .show_server_message(&format!("{}{}", RETRIEVE_MARKER, top.render()));
            self.process(top);
        }
    }

    /// Check a response id against the newest unanswered request
    fn match_msg_id(&mut self, msg_id: MsgId) -> Result<(), ProtocolError> {
        match self.pending.last() {
            Some(top) if top.msg_id != msg_id => Err(ProtocolError::MsgIdMismatch {
                player_id: self.player_id.unwrap_or_default(),
                msg_id,
            }),
            Some(_) => {
                self.pending.pop();
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn send(&mut self, line: String) {
        if self.outbound.send(line).is_err() {
            self.ui.show_network_status("Connection closed");
        }
    }

    /// Validate and, if the current phase allows it, send one user command
    pub fn submit(&mut self, input: &str) -> Result<Outcome, ProtocolError> {
        let message = self.registry.validate(input)?;
        let command = ClientCommand::try_from(&message)?;
        let line = message.to_line();

        match (self.phase, &command) {
            (PeerPhase::WaitingAck | PeerPhase::WaitingStart, ClientCommand::Ack { msg_id, .. }) => {
                self.match_msg_id(*msg_id)?;
                self.phase = PeerPhase::Staying;
                self.send(line);
                self.retrieve();
            }
            (PeerPhase::Rolling, ClientCommand::KeepDice { msg_id, .. })
            | (PeerPhase::Scoring, ClientCommand::ScoreChoice { msg_id, .. }) => {
                self.match_msg_id(*msg_id)?;
                self.phase = PeerPhase::Staying;
                self.send(line);
            }
            (_, ClientCommand::PrintGameState { .. }) => {
                self.phase = PeerPhase::Staying;
                self.send(line);
            }
            (PeerPhase::WaitingStart, ClientCommand::QuitGame { .. }) => {
                self.pending.clear();
                self.send(line);
            }
            (_, ClientCommand::QuitGame { .. }) => {
                self.phase = PeerPhase::Staying;
                self.send(line);
            }
            (phase, command) => {
                debug!("{} not allowed while {}", command.name(), phase);
                self.ui.show_client_message(REJECT_NOTICE);
                return Ok(Outcome::Rejected);
            }
        }
        Ok(Outcome::Sent)
    }

    /// `submit`, with any error shown to the user
    pub fn handle_input(&mut self, input: &str) -> Outcome {
        match self.submit(input) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.ui.show_client_message(&e.to_string());
                Outcome::Rejected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
    }

    impl ClientUi for Recorder {
        fn show_server_message(&mut self, message: &str) {
            self.lines.push(message.to_string());
        }
        fn show_client_message(&mut self, message: &str) {
            self.lines.push(format!("client: {}", message));
        }
        fn show_network_status(&mut self, status: &str) {
            self.lines.push(format!("network: {}", status));
        }
    }

    fn peer() -> (PeerSession<Recorder>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PeerSession::new(Recorder::default(), tx), rx)
    }

    #[test]
    fn test_start_game_then_ack() {
        let (mut peer, mut rx) = peer();
        peer.on_server_line("[SERVER] INFO 1 You joined the game now. Your name is PLAYER-3. Please enjoy yourself.")
            .unwrap();
        peer.on_server_line("[SERVER] START_GAME 2 <NEED RESPONSE>").unwrap();

        assert_eq!(peer.player_id(), Some(3));
        assert_eq!(peer.phase(), PeerPhase::WaitingStart);
        assert_eq!(peer.submit("ACK 2").unwrap(), Outcome::Sent);
        assert_eq!(rx.try_recv().unwrap(), "ACK 2");
        assert_eq!(peer.phase(), PeerPhase::Staying);
        assert!(peer.pending().is_empty());
    }

    #[test]
    fn test_keep_dice_rejected_outside_rolling() {
        let (mut peer, mut rx) = peer();
        peer.on_server_line("[SERVER] START_TURN 5 1 <NEED RESPONSE>").unwrap();

        assert_eq!(peer.submit("KEEP_DICE 5 1 1 1 1 1").unwrap(), Outcome::Rejected);
        assert!(rx.try_recv().is_err());
        assert_eq!(
            peer.ui().lines.last().unwrap(),
            &format!("client: {}", REJECT_NOTICE)
        );
    }

    #[test]
    fn test_stale_ack_is_mismatch() {
        let (mut peer, _rx) = peer();
        peer.on_server_line("[SERVER] TURN_OVER 8 <NEED RESPONSE>").unwrap();

        let err = peer.submit("ACK 7").unwrap_err();
        assert!(matches!(err, ProtocolError::MsgIdMismatch { msg_id: 7, .. }));
        assert_eq!(peer.phase(), PeerPhase::WaitingAck);
        assert_eq!(peer.pending().len(), 1);
    }

    #[test]
    fn test_info_replays_buffered_request() {
        let (mut peer, _rx) = peer();
        peer.on_server_line("[SERVER] CHOOSE_DICE 4 1 2 3 4 5 <NEED RESPONSE>").unwrap();
        peer.submit("PRINT_GAME_STATE 9").unwrap();
        assert_eq!(peer.phase(), PeerPhase::Staying);

        peer.on_server_line("[SERVER] GAME_STATE 9 Round: 1 Turn: PLAYER-1 STATE: Rolling").unwrap();

        assert_eq!(peer.phase(), PeerPhase::Rolling);
        assert_eq!(peer.pending().len(), 1);
        assert!(peer
            .ui()
            .lines
            .last()
            .unwrap()
            .starts_with("(RETRIEVE)[SERVER] CHOOSE_DICE 4"));
    }

    #[test]
    fn test_ack_replays_next_request() {
        let (mut peer, mut rx) = peer();
        peer.on_server_line("[SERVER] ROUND_OVER 10 1 <NEED RESPONSE>").unwrap();
        peer.on_server_line("[SERVER] START_ROUND 12 2 <NEED RESPONSE>").unwrap();

        peer.submit("ACK 12").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "ACK 12");
        // ROUND_OVER is back on top and the peer waits to acknowledge it
        assert_eq!(peer.phase(), PeerPhase::WaitingAck);
        assert_eq!(peer.pending().last().unwrap().msg_id, 10);
    }

    #[test]
    fn test_game_over_flag_and_score_choice_valid_not_buffered() {
        let (mut peer, _rx) = peer();
        peer.on_server_line("[SERVER] SCORE_CHOICE_VALID 3 Aces: 3 Total: 3").unwrap();
        assert!(peer.pending().is_empty());
        assert_eq!(peer.phase(), PeerPhase::WaitingAck);

        peer.on_server_line("[SERVER] GAME_OVER 4 PLAYER-1: Total: 3 <NEED RESPONSE>").unwrap();
        assert!(peer.is_game_over());
    }

    #[test]
    fn test_malformed_input_reported() {
        let (mut peer, _rx) = peer();
        assert_eq!(peer.handle_input("FLY 1"), Outcome::Rejected);
        assert_eq!(
            peer.ui().lines.last().unwrap(),
            "client: FORMAT CHECK ERROR. Invalid frame was given."
        );
    }
}
