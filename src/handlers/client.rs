use std::net::TcpStream as StdTcpStream;
use std::sync::PoisonError;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::core::message_handler::MessageHandler;
use crate::core::message_types::PlayerId;
use crate::core::session::SharedSession;
use crate::core::thread_pool::WorkerSlot;

/// Runs the departure handler exactly once when the worker ends, however it ends
struct DisconnectGuard {
    player_id: PlayerId,
    session: SharedSession,
    slot: Option<WorkerSlot>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        // The slot must be free before the seat is, admission wakes on the seat
        drop(self.slot.take());
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session.player_quit(self.player_id);
        info!(
            "PLAYER-{} disconnected, {} players seated",
            self.player_id,
            session.player_count()
        );
    }
}

// Serve one seated player until its socket closes
pub async fn handle_client(
    player_id: PlayerId,
    stream: StdTcpStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    handler: MessageHandler,
    slot: WorkerSlot,
) {
    let guard = DisconnectGuard {
        player_id,
        session: handler.session().clone(),
        slot: Some(slot),
    };

    let stream = match stream
        .set_nonblocking(true)
        .and_then(|_| TcpStream::from_std(stream))
    {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to register socket for PLAYER-{}: {}", player_id, e);
            return;
        }
    };

    match stream.peer_addr() {
        Ok(addr) => info!("New client connected: PLAYER-{} from {}", player_id, addr),
        Err(_) => info!("New client connected: PLAYER-{}", player_id),
    }

    let (reader, mut writer) = stream.into_split();

    // Spawn a task to forward queued lines from the session to the socket
    tokio::spawn(async move {
        while let Some(line) = outbound.recv().await {
            let framed = format!("{}\n", line);
            if let Err(e) = writer.write_all(framed.as_bytes()).await {
                error!("Failed to write to PLAYER-{}: {}", player_id, e);
                break;
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Err(e) = handler.handle_line(player_id, &line) {
                    error!("Failed to process line from PLAYER-{}: {}", player_id, e);
                    break;
                }
            }
            Ok(None) => {
                info!("PLAYER-{} closed the connection", player_id);
                break;
            }
            Err(e) => {
                warn!("Read error from PLAYER-{}: {}", player_id, e);
                break;
            }
        }
    }

    drop(guard);
}
