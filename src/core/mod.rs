//! Core functionality for the game server

pub mod barrier;
pub mod connection;
pub mod ledger;
pub mod message;
pub mod message_handler;
pub mod message_types;
pub mod server;
pub mod session;
pub mod thread_pool;

// Re-export main components for convenience
pub use barrier::RoundBarrier;
pub use connection::Connection;
pub use ledger::{AckLedger, PendingResponse};
pub use message::ServerMessage;
pub use message_handler::MessageHandler;
pub use message_types::{ClientCommand, MsgId, PlayerId, ServerFrame};
pub use server::{GameServer, RunningServer};
pub use session::{create_session, lock_session, GameSession, Phase, SharedSession};
pub use thread_pool::{create_worker_pool, SharedWorkerPool, WorkerPool};
