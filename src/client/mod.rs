//! Game client: peer state machine, front-end and network loop

pub mod network;
pub mod peer;
pub mod ui;

pub use peer::{Outcome, PeerPhase, PeerSession};
pub use ui::{ClientUi, TextUi};
