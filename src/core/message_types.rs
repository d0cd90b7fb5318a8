//! Frame vocabularies for both directions of the game protocol

use std::fmt;
use std::str::FromStr;

use crate::constants::DICE_COUNT;
use crate::error::ProtocolError;
use crate::game::Category;
use crate::protocol::CanonicalMessage;

pub type PlayerId = u32;
pub type MsgId = u64;

/// Server-to-client frame names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerFrame {
    StartGame,
    StartRound,
    StartTurn,
    ChooseDice,
    InvalidDiceChoice,
    ChooseScore,
    ScoreChoiceInvalid,
    ScoreChoiceValid,
    TurnOver,
    RoundOver,
    GameOver,
    Info,
    GameState,
    Ack,
}

impl ServerFrame {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerFrame::StartGame => "START_GAME",
            ServerFrame::StartRound => "START_ROUND",
            ServerFrame::StartTurn => "START_TURN",
            ServerFrame::ChooseDice => "CHOOSE_DICE",
            ServerFrame::InvalidDiceChoice => "INVALID_DICE_CHOICE",
            ServerFrame::ChooseScore => "CHOOSE_SCORE",
            ServerFrame::ScoreChoiceInvalid => "SCORE_CHOICE_INVALID",
            ServerFrame::ScoreChoiceValid => "SCORE_CHOICE_VALID",
            ServerFrame::TurnOver => "TURN_OVER",
            ServerFrame::RoundOver => "ROUND_OVER",
            ServerFrame::GameOver => "GAME_OVER",
            ServerFrame::Info => "INFO",
            ServerFrame::GameState => "GAME_STATE",
            ServerFrame::Ack => "ACK",
        }
    }

    /// Pure information frames never change the peer's phase
    pub fn is_informational(self) -> bool {
        matches!(
            self,
            ServerFrame::Info | ServerFrame::GameState | ServerFrame::Ack
        )
    }

    /// Whether the peer keeps this frame on its replay stack
    pub fn is_buffered(self) -> bool {
        !self.is_informational() && self != ServerFrame::ScoreChoiceValid
    }
}

impl fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerFrame {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let frame = match s {
            "START_GAME" => ServerFrame::StartGame,
            "START_ROUND" => ServerFrame::StartRound,
            "START_TURN" => ServerFrame::StartTurn,
            "CHOOSE_DICE" => ServerFrame::ChooseDice,
            "INVALID_DICE_CHOICE" => ServerFrame::InvalidDiceChoice,
            "CHOOSE_SCORE" => ServerFrame::ChooseScore,
            "SCORE_CHOICE_INVALID" => ServerFrame::ScoreChoiceInvalid,
            "SCORE_CHOICE_VALID" => ServerFrame::ScoreChoiceValid,
            "TURN_OVER" => ServerFrame::TurnOver,
            "ROUND_OVER" => ServerFrame::RoundOver,
            "GAME_OVER" => ServerFrame::GameOver,
            "INFO" => ServerFrame::Info,
            "GAME_STATE" => ServerFrame::GameState,
            "ACK" => ServerFrame::Ack,
            other => return Err(ProtocolError::UnknownFrame(other.to_string())),
        };
        Ok(frame)
    }
}

/// A validated client line, decoded into its typed form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Ack { msg_id: MsgId, text: Option<String> },
    KeepDice { msg_id: MsgId, keep: [bool; DICE_COUNT] },
    ScoreChoice { msg_id: MsgId, category: Category },
    PrintGameState { msg_id: MsgId },
    QuitGame { msg_id: MsgId },
}

impl ClientCommand {
    pub fn msg_id(&self) -> MsgId {
        match self {
            ClientCommand::Ack { msg_id, .. }
            | ClientCommand::KeepDice { msg_id, .. }
            | ClientCommand::ScoreChoice { msg_id, .. }
            | ClientCommand::PrintGameState { msg_id }
            | ClientCommand::QuitGame { msg_id } => *msg_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Ack { .. } => "ACK",
            ClientCommand::KeepDice { .. } => "KEEP_DICE",
            ClientCommand::ScoreChoice { .. } => "SCORE_CHOICE",
            ClientCommand::PrintGameState { .. } => "PRINT_GAME_STATE",
            ClientCommand::QuitGame { .. } => "QUIT_GAME",
        }
    }
}

impl TryFrom<&CanonicalMessage> for ClientCommand {
    type Error = ProtocolError;

    fn try_from(message: &CanonicalMessage) -> Result<Self, Self::Error> {
        let format_error = |token: &str| ProtocolError::PayloadFormat {
            frame: message.frame().to_string(),
            token: token.to_string(),
        };

        let payload = message.payload();
        let msg_id = message
            .msg_id()
            .ok_or_else(|| format_error(payload.first().map(String::as_str).unwrap_or("")))?;

        let command = match message.frame() {
            "ACK" => ClientCommand::Ack {
                msg_id,
                text: payload.get(1).cloned(),
            },
            "KEEP_DICE" => {
                let mut keep = [false; DICE_COUNT];
                for (slot, token) in keep.iter_mut().zip(&payload[1..]) {
                    *slot = match token.as_str() {
                        "1" => true,
                        "0" => false,
                        other => return Err(format_error(other)),
                    };
                }
                ClientCommand::KeepDice { msg_id, keep }
            }
            "SCORE_CHOICE" => {
                let token = payload.get(1).map(String::as_str).unwrap_or("");
                let category = token.parse().map_err(|_| format_error(token))?;
                ClientCommand::ScoreChoice { msg_id, category }
            }
            "PRINT_GAME_STATE" => ClientCommand::PrintGameState { msg_id },
            "QUIT_GAME" => ClientCommand::QuitGame { msg_id },
            other => return Err(ProtocolError::UnknownFrame(other.to_string())),
        };
        Ok(command)
    }
}
