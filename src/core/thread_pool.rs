//! Worker pool for connection workers
//!
//! A dedicated multi-thread runtime sized to the seat limit. A worker slot is
//! a semaphore permit: the admission controller takes one before seating a
//! player and the connection worker gives it back before the seat is freed,
//! so a freed seat always has a free slot.

use std::sync::Arc;

use log::{debug, info};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::error::{Result, YahtzeeError};

/// One of the pool's `max_tasks` connection worker slots
pub type WorkerSlot = OwnedSemaphorePermit;

pub struct WorkerPool {
    /// Runtime instance managing the worker threads
    runtime: Option<Runtime>,
    worker_count: usize,
    /// Maximum number of connection workers running at once
    max_tasks: usize,
    slots: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool with `worker_count` threads and `max_tasks` worker slots
    pub fn new(worker_count: usize, max_tasks: usize) -> Result<Self> {
        // Set a minimum number of threads to avoid performance issues
        let actual_workers = worker_count.max(2);

        let runtime = Builder::new_multi_thread()
            .worker_threads(actual_workers)
            .enable_io()
            .enable_time()
            .thread_name("yahtzee-worker")
            .build()
            .map_err(|e| {
                YahtzeeError::WorkerPool(format!("Failed to build worker pool runtime: {}", e))
            })?;

        info!(
            "Created worker pool with {} threads and {} worker slots",
            actual_workers, max_tasks
        );

        Ok(Self {
            runtime: Some(runtime),
            worker_count: actual_workers,
            max_tasks,
            slots: Arc::new(Semaphore::new(max_tasks)),
        })
    }

    /// One thread and one slot per seat
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::new(config.max_players, config.max_players)
    }

    /// Wait for a free worker slot
    pub async fn acquire_slot(&self) -> Result<WorkerSlot> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| YahtzeeError::WorkerPool(format!("Worker slots closed: {}", e)))?;
        debug!("Worker slot taken, {} left", self.slots.available_permits());
        Ok(slot)
    }

    /// Take a free worker slot without waiting
    pub fn try_acquire_slot(&self) -> Option<WorkerSlot> {
        Arc::clone(&self.slots).try_acquire_owned().ok()
    }

    /// Run a future on the pool.
    ///
    /// The future should own the `WorkerSlot` it was admitted with. Returns
    /// `None` once the pool has shut down.
    pub fn execute<F>(&self, future: F) -> Option<JoinHandle<F::Output>>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let runtime = self.runtime.as_ref()?;
        Some(runtime.spawn(future))
    }

    /// Slots currently held by admitted workers
    pub fn active_task_count(&self) -> usize {
        self.max_tasks - self.slots.available_permits()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        info!("Shutting down worker pool with {} threads", self.worker_count);
        self.slots.close();
        // Dropping a runtime from inside another runtime panics
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Shared pool handle for the admission controller
pub type SharedWorkerPool = Arc<WorkerPool>;

pub fn create_worker_pool(config: &ServerConfig) -> Result<SharedWorkerPool> {
    let pool = WorkerPool::from_config(config)?;
    Ok(Arc::new(pool))
}
