use std::fmt;

use crate::constants::{NEED_RESPONSE, SERVER_TAG};
use crate::core::message_types::{MsgId, ServerFrame};
use crate::error::ProtocolError;

/// One server-originated line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub frame: ServerFrame,
    pub msg_id: MsgId,
    pub content: String,
    pub need_response: bool,
}

impl ServerMessage {
    pub fn new(frame: ServerFrame, msg_id: MsgId, content: impl Into<String>) -> Self {
        Self {
            frame,
            msg_id,
            content: content.into(),
            need_response: false,
        }
    }

    pub fn requiring_response(mut self) -> Self {
        self.need_response = true;
        self
    }

    /// Render to the wire form, without the trailing newline
    pub fn render(&self) -> String {
        let mut line = format!("{} {} {}", SERVER_TAG, self.frame, self.msg_id);
        if !self.content.is_empty() {
            line.push(' ');
            line.push_str(&self.content);
        }
        if self.need_response {
            line.push(' ');
            line.push_str(NEED_RESPONSE);
        }
        line
    }

    /// Parse a server line as read by a client
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();

        if tokens.first() != Some(&SERVER_TAG) {
            let header = tokens.first().copied().unwrap_or_default();
            return Err(ProtocolError::UnknownFrame(header.to_string()));
        }
        if tokens.len() < 3 {
            return Err(ProtocolError::PayloadCount {
                frame: tokens.get(1).copied().unwrap_or_default().to_string(),
                expected: vec![1],
                actual: tokens.len().saturating_sub(2),
            });
        }

        let frame: ServerFrame = tokens[1].parse()?;
        let msg_id = tokens[2]
            .parse()
            .map_err(|_| ProtocolError::PayloadFormat {
                frame: frame.to_string(),
                token: tokens[2].to_string(),
            })?;

        let marker: Vec<&str> = NEED_RESPONSE.split(' ').collect();
        let need_response = tokens.len() >= 3 + marker.len() && tokens.ends_with(&marker);
        if need_response {
            tokens.truncate(tokens.len() - marker.len());
        }

        Ok(Self {
            frame,
            msg_id,
            content: tokens[3..].join(" "),
            need_response,
        })
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
