//! Frame catalog and syntactic validation for client-issued lines.
//!
//! The registry only answers "is this line well formed"; whether a frame
//! is legal right now is decided by the session and peer state machines.

pub mod frame;
pub mod registry;

pub use frame::{FrameBuilder, FrameDef, PayloadGroup};
pub use registry::{client_registry, CanonicalMessage, FrameRegistry};
