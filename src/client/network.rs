//! Client network loop: one task reads server lines into the peer, the
//! caller's input stream feeds user commands, a writer task owns the socket.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::client::peer::PeerSession;
use crate::client::ui::ClientUi;
use crate::config::ClientConfig;
use crate::error::Result;

/// Play one game against the server at `config`, reading commands from `input`.
///
/// Returns after the user's first command following `GAME_OVER`, after the
/// server closes the connection and one more command is entered, or when
/// `input` ends.
pub async fn run<U, R>(config: &ClientConfig, mut ui: U, input: R) -> Result<()>
where
    U: ClientUi + Send + 'static,
    R: AsyncBufRead + Unpin,
{
    let stream = match TcpStream::connect(config.address()).await {
        Ok(stream) => stream,
        Err(e) => {
            ui.show_network_status(&format!("Failed to connect to {}: {}", config.address(), e));
            return Err(e.into());
        }
    };
    ui.show_network_status("Connecting Server and waiting for new game.");
    info!("Connected to {}", config.address());

    let (reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let peer = Arc::new(Mutex::new(PeerSession::new(ui, tx)));

    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            debug!("-> {}", line);
            let framed = format!("{}\n", line);
            if let Err(e) = writer.write_all(framed.as_bytes()).await {
                error!("Failed to send to server: {}", e);
                break;
            }
        }
    });

    let reader_task = tokio::spawn({
        let peer = Arc::clone(&peer);
        async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                let next = lines.next_line().await;
                let mut guard = peer.lock().unwrap_or_else(PoisonError::into_inner);
                match next {
                    Ok(Some(line)) => {
                        if let Err(e) = guard.on_server_line(&line) {
                            guard.ui_mut().show_client_message(&e.to_string());
                        }
                        if guard.is_game_over() {
                            debug!("Game over, no more server lines will be read");
                            break;
                        }
                    }
                    Ok(None) => {
                        guard.ui_mut().show_network_status("Connection closed");
                        break;
                    }
                    Err(e) => {
                        guard
                            .ui_mut()
                            .show_network_status(&format!("Connection break off. {}", e));
                        break;
                    }
                }
            }
        }
    });

    let mut commands = input.lines();
    while let Some(command) = commands.next_line().await? {
        if command.trim().is_empty() {
            continue;
        }
        peer.lock()?.handle_input(&command);
        if reader_task.is_finished() {
            break;
        }
    }

    reader_task.abort();
    let _ = reader_task.await;
    // Last sender goes with the peer, which lets the writer drain and stop
    drop(peer);
    let _ = writer_task.await;
    Ok(())
}
