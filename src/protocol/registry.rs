//! Frame registry and the line validator built on it.

use std::collections::HashMap;
use std::sync::LazyLock;

use log::trace;

use crate::error::ProtocolError;
use crate::protocol::frame::{FrameBuilder, FrameDef};

pub const MSG_ID_PATTERN: &str = r"[1-9]\d*";
pub const KEEP_PATTERN: &str = "[0-1]";
pub const SCORE_NAME_PATTERN: &str =
    "Aces|Twos|Threes|Fours|Fives|Sixes|ThreeOfKing|FourOfKind|FH|SS|LS|Yahtzee|Chance";
pub const TEXT_PATTERN: &str = ".*";

static CLIENT_REGISTRY: LazyLock<FrameRegistry> = LazyLock::new(|| {
    let frames = [
        FrameBuilder::new("KEEP_DICE")
            .desc("Keep flags for the five dice, 1 keeps and 0 re-rolls")
            .payload(1, MSG_ID_PATTERN)
            .payload(5, KEEP_PATTERN),
        FrameBuilder::new("SCORE_CHOICE")
            .desc("Commit the current dice to a score category")
            .payload(1, MSG_ID_PATTERN)
            .payload(1, SCORE_NAME_PATTERN),
        FrameBuilder::new("ACK")
            .desc("Acknowledge a server request")
            .payload(1, MSG_ID_PATTERN)
            .optional_payload(1, TEXT_PATTERN),
        FrameBuilder::new("PRINT_GAME_STATE")
            .desc("Ask for the current phase and every scorecard")
            .payload(1, MSG_ID_PATTERN),
        FrameBuilder::new("QUIT_GAME")
            .desc("Finish the game after the current round")
            .payload(1, MSG_ID_PATTERN),
    ];

    let mut registry = FrameRegistry::new();
    for frame in frames {
        registry.register(frame.build().expect("valid frame pattern"));
    }
    registry
});

/// The catalog of client-issuable frames
pub fn client_registry() -> &'static FrameRegistry {
    &CLIENT_REGISTRY
}

/// A line that passed validation, split into single-space tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    tokens: Vec<String>,
}

impl CanonicalMessage {
    pub fn frame(&self) -> &str {
        &self.tokens[0]
    }

    pub fn payload(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// First payload token as a message id, for frames that carry one
    pub fn msg_id(&self) -> Option<u64> {
        self.payload().first().and_then(|t| t.parse().ok())
    }

    pub fn to_line(&self) -> String {
        self.tokens.join(" ")
    }
}

#[derive(Debug, Default)]
pub struct FrameRegistry {
    frames: HashMap<String, FrameDef>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
        }
    }

    /// Add a frame, replacing any earlier frame with the same name
    pub fn register(&mut self, frame: FrameDef) {
        self.frames.insert(frame.name().to_string(), frame);
    }

    pub fn get(&self, name: &str) -> Option<&FrameDef> {
        self.frames.get(name)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.frames.keys().map(String::as_str)
    }

    /// Check a raw line against the catalog.
    ///
    /// Purely syntactic: the header must name a frame, the payload size
    /// must equal the required-only or the full count, and each token must
    /// match its group's pattern. Absent optional groups are skipped.
    pub fn validate(&self, raw: &str) -> Result<CanonicalMessage, ProtocolError> {
        let tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();

        let header = tokens.first().map(String::as_str).unwrap_or_default();
        let frame = self
            .frames
            .get(header)
            .ok_or_else(|| ProtocolError::UnknownFrame(header.to_string()))?;

        let payload = &tokens[1..];
        if !frame.accepts_len(payload.len()) {
            return Err(ProtocolError::PayloadCount {
                frame: frame.name().to_string(),
                expected: vec![frame.required_count(), frame.total_count()],
                actual: payload.len(),
            });
        }

        let with_optionals = payload.len() == frame.total_count();
        let mut remaining = payload.iter();
        for group in frame.groups() {
            if group.is_optional() && !with_optionals {
                continue;
            }
            for token in remaining.by_ref().take(group.count()) {
                if !group.matches(token) {
                    return Err(ProtocolError::PayloadFormat {
                        frame: frame.name().to_string(),
                        token: token.clone(),
                    });
                }
            }
        }

        trace!("Validated {} frame with {} payload tokens", frame.name(), payload.len());
        Ok(CanonicalMessage { tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_registry_has_all_frames() {
        let registry = client_registry();
        assert_eq!(registry.len(), 5);
        for name in ["KEEP_DICE", "SCORE_CHOICE", "ACK", "PRINT_GAME_STATE", "QUIT_GAME"] {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_validate_canonicalizes_whitespace() {
        let msg = client_registry().validate("  KEEP_DICE   4 1 1\t0 0 0 ").unwrap();
        assert_eq!(msg.to_line(), "KEEP_DICE 4 1 1 0 0 0");
        assert_eq!(msg.frame(), "KEEP_DICE");
        assert_eq!(msg.msg_id(), Some(4));
    }

    #[test]
    fn test_empty_line_is_unknown_frame() {
        let err = client_registry().validate("   ").unwrap_err();
        assert_eq!(err, ProtocolError::UnknownFrame(String::new()));
    }

    #[test]
    fn test_optional_group_in_the_middle_is_skipped() {
        let mut registry = FrameRegistry::new();
        registry.register(
            FrameBuilder::new("MIXED")
                .payload(1, "a")
                .optional_payload(1, "b")
                .payload(1, "c")
                .build()
                .unwrap(),
        );

        assert!(registry.validate("MIXED a c").is_ok());
        assert!(registry.validate("MIXED a b c").is_ok());
        assert!(matches!(
            registry.validate("MIXED a b"),
            Err(ProtocolError::PayloadFormat { .. })
        ));
    }

    #[test]
    fn test_leading_zero_msg_id_rejected() {
        let err = client_registry().validate("ACK 05").unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadFormat { .. }));
    }
}
