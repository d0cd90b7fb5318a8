//! TCP game server and its admission controller
//!
//! The accept loop pushes every new socket into a bounded intake queue and
//! waits while the queue is full. A single admission task takes sockets off
//! the queue, reserves a worker slot, and seats them only when the session's
//! phase allows it. While a round is being played it waits for the round
//! barrier to release; otherwise it parks on the barrier's change feed.

use std::net::{SocketAddr, TcpStream as StdTcpStream};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::ServerConfig;
use crate::core::barrier::RoundBarrier;
use crate::core::message_handler::MessageHandler;
use crate::core::message_types::PlayerId;
use crate::core::session::{create_session, lock_session, SharedSession};
use crate::core::thread_pool::{create_worker_pool, SharedWorkerPool, WorkerSlot};
use crate::error::{Result, YahtzeeError};
use crate::handlers::client::handle_client;

/// A socket waiting for a seat
type QueuedSocket = (StdTcpStream, SocketAddr);

pub struct GameServer {
    config: ServerConfig,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Bind the listener and start the accept and admission tasks
    pub async fn bind(self) -> Result<RunningServer> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Yahtzee server listening on {} (max {} players, {} rounds)",
            local_addr, self.config.max_players, self.config.max_round
        );

        let session = create_session(&self.config);
        let pool = create_worker_pool(&self.config)?;
        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity);

        let barrier = lock_session(&session)?.barrier();
        let admission = AdmissionController {
            handler: MessageHandler::new(Arc::clone(&session)),
            session: Arc::clone(&session),
            barrier,
            pool: Arc::clone(&pool),
            pause: self.config.admission_pause,
        };

        let tasks = vec![
            tokio::spawn(accept_loop(listener, queue_tx)),
            tokio::spawn(admission.run(queue_rx)),
        ];

        Ok(RunningServer {
            local_addr,
            session,
            pool,
            tasks,
        })
    }

    /// Bind and serve until the accept loop stops
    pub async fn run(self) -> Result<()> {
        self.bind().await?.wait().await
    }
}

/// Handle on a bound server. Dropping it stops accepting and admitting.
pub struct RunningServer {
    local_addr: SocketAddr,
    session: SharedSession,
    pool: SharedWorkerPool,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Connection workers currently holding a slot
    pub fn active_workers(&self) -> usize {
        self.pool.active_task_count()
    }

    /// Wait for the accept and admission tasks to finish
    pub async fn wait(mut self) -> Result<()> {
        for task in std::mem::take(&mut self.tasks) {
            task.await
                .map_err(|e| YahtzeeError::Connection(format!("Server task failed: {}", e)))?;
        }
        Ok(())
    }

    pub fn shutdown(self) {
        info!("Shutting down server on {}", self.local_addr);
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, queue: mpsc::Sender<QueuedSocket>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        // Workers run on the pool's own runtime, so the socket leaves this
        // reactor before it is queued
        let stream = match stream.into_std() {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to detach socket from {}: {}", addr, e);
                continue;
            }
        };

        debug!("Queued connection from {}", addr);
        if queue.send((stream, addr)).await.is_err() {
            warn!("Admission queue closed, stopping accept loop");
            return;
        }
    }
}

struct AdmissionController {
    session: SharedSession,
    handler: MessageHandler,
    barrier: Arc<RoundBarrier>,
    pool: SharedWorkerPool,
    pause: Duration,
}

impl AdmissionController {
    async fn run(self, mut queue: mpsc::Receiver<QueuedSocket>) {
        loop {
            let mut changes = self.barrier.subscribe();
            let seats_full = match lock_session(&self.session) {
                Ok(session) => session.seats_full(),
                Err(e) => {
                    error!("Admission stopped: {}", e);
                    return;
                }
            };

            if seats_full {
                debug!("All seats taken, waiting for a player to leave");
                if changes.changed().await.is_err() {
                    return;
                }
                continue;
            }

            let Some((stream, addr)) = queue.recv().await else {
                info!("Admission queue closed");
                return;
            };

            if !self.admit(stream, addr).await {
                return;
            }
            sleep(self.pause).await;
        }
    }

    /// Seat one socket, waiting for a worker slot and an admission window.
    /// Returns false if admission has to stop.
    async fn admit(&self, stream: StdTcpStream, addr: SocketAddr) -> bool {
        let slot = match self.pool.acquire_slot().await {
            Ok(slot) => slot,
            Err(e) => {
                error!("Admission stopped: {}", e);
                return false;
            }
        };

        let mut deferred = false;
        loop {
            let mut changes = self.barrier.subscribe();
            let (tx, rx) = mpsc::unbounded_channel();

            let (admitted, in_round, generation) = match lock_session(&self.session) {
                Ok(mut session) => {
                    let admitted = session.try_admit(tx, Some(addr));
                    // Barrier changes happen under the session lock, so this
                    // snapshot matches the phase
                    let in_round =
                        !session.phase().admits_players() && self.barrier.remaining() > 0;
                    (admitted, in_round, self.barrier.generation())
                }
                Err(e) => {
                    error!("Admission stopped: {}", e);
                    return false;
                }
            };

            if let Some(player_id) = admitted {
                self.spawn_worker(player_id, stream, rx, slot);
                return true;
            }

            if !deferred {
                info!("Deferring connection from {} until the round barrier releases", addr);
                deferred = true;
            }
            if in_round {
                debug!("Waiting for the round barrier to release");
                self.barrier.wait_for_release(generation).await;
            } else if changes.changed().await.is_err() {
                return false;
            }
        }
    }

    fn spawn_worker(
        &self,
        player_id: PlayerId,
        stream: StdTcpStream,
        outbound: mpsc::UnboundedReceiver<String>,
        slot: WorkerSlot,
    ) {
        let worker = handle_client(player_id, stream, outbound, self.handler.clone(), slot);
        if self.pool.execute(worker).is_none() {
            warn!("Worker pool is shut down, dropping PLAYER-{}", player_id);
            match lock_session(&self.session) {
                Ok(mut session) => session.player_quit(player_id),
                Err(e) => error!("Failed to unseat PLAYER-{}: {}", player_id, e),
            }
        }
    }
}
