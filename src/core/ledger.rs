//! Acknowledgment ledger
//!
//! Records every server message sent with the response-required marker until
//! the addressed player answers it. Matching is keyed on `(player, msg id)`
//! so one broadcast can hold an outstanding entry per recipient.

use std::collections::VecDeque;

use log::debug;

use crate::core::message_types::{MsgId, PlayerId};
use crate::error::ProtocolError;

/// A request sent to one player and not yet answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResponse {
    pub player_id: PlayerId,
    pub rendered: String,
    pub msg_id: MsgId,
}

#[derive(Debug, Default)]
pub struct AckLedger {
    entries: VecDeque<PendingResponse>,
}

impl AckLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, player_id: PlayerId, rendered: impl Into<String>, msg_id: MsgId) {
        self.entries.push_back(PendingResponse {
            player_id,
            rendered: rendered.into(),
            msg_id,
        });
    }

    /// Remove the entry for `(player_id, msg_id)`.
    ///
    /// Scans from the tail, rotating every non-matching entry to the head.
    /// A full scan without a match leaves the original order intact.
    pub fn match_response(&mut self, player_id: PlayerId, msg_id: MsgId) -> Result<(), ProtocolError> {
        for _ in 0..self.entries.len() {
            let Some(entry) = self.entries.pop_back() else {
                break;
            };
            if entry.player_id == player_id && entry.msg_id == msg_id {
                debug!("Matched response {} from PLAYER-{}", msg_id, player_id);
                return Ok(());
            }
            self.entries.push_front(entry);
        }
        Err(ProtocolError::MsgIdMismatch { player_id, msg_id })
    }

    /// Drop every entry addressed to `player_id`
    pub fn purge(&mut self, player_id: PlayerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.player_id != player_id);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn has_pending_for(&self, player_id: PlayerId) -> bool {
        self.entries.iter().any(|entry| entry.player_id == player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingResponse> {
        self.entries.iter()
    }
}
