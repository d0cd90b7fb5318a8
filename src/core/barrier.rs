//! Round barrier
//!
//! A counting latch armed once per round with the number of seated players.
//! Each player releases it once at the round boundary; a disconnect releases
//! on the leaver's behalf. Every change bumps a `watch` counter so waiters
//! can re-check without polling.

use std::sync::{Mutex, MutexGuard};

use log::debug;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct BarrierState {
    remaining: usize,
    generation: u64,
}

#[derive(Debug)]
pub struct RoundBarrier {
    state: Mutex<BarrierState>,
    changes: watch::Sender<u64>,
}

impl Default for RoundBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundBarrier {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Mutex::new(BarrierState::default()),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self) {
        self.changes.send_modify(|count| *count = count.wrapping_add(1));
    }

    /// Reset the count to `parties` for a new round
    pub fn arm(&self, parties: usize) {
        {
            let mut state = self.lock();
            state.remaining = parties;
            debug!("Round barrier armed with {} parties", parties);
        }
        self.notify();
    }

    /// One more party for the current round, used for a between-round join
    pub fn add_party(&self) {
        {
            let mut state = self.lock();
            state.remaining += 1;
        }
        self.notify();
    }

    /// Count down by one. Returns true if this release tripped the barrier.
    /// Subscribers are woken even when the count was already zero.
    pub fn release_one(&self) -> bool {
        let tripped = {
            let mut state = self.lock();
            match state.remaining {
                0 => false,
                1 => {
                    state.remaining = 0;
                    state.generation += 1;
                    true
                }
                _ => {
                    state.remaining -= 1;
                    false
                }
            }
        };
        if tripped {
            debug!("Round barrier released");
        }
        self.notify();
        tripped
    }

    /// Drop the count to zero at once, releasing every waiter
    pub fn drain(&self) {
        {
            let mut state = self.lock();
            state.remaining = 0;
            state.generation += 1;
        }
        self.notify();
    }

    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }

    /// Number of times the barrier has been released or drained
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Wait until the count is zero, or until a release that happens after
    /// this call even if the barrier is re-armed right away.
    pub async fn wait(&self) {
        let seen = self.generation();
        self.wait_for_release(seen).await;
    }

    /// Wait until the count is zero or the barrier has been released since
    /// generation `seen`. Returns at once if that already happened.
    pub async fn wait_for_release(&self, seen: u64) {
        let mut changes = self.subscribe();
        loop {
            {
                let state = self.lock();
                if state.remaining == 0 || state.generation != seen {
                    return;
                }
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_release_trips_once() {
        let barrier = RoundBarrier::new();
        barrier.arm(2);

        assert!(!barrier.release_one());
        assert!(barrier.release_one());
        assert!(!barrier.release_one());
        assert_eq!(barrier.remaining(), 0);
        assert_eq!(barrier.generation(), 1);
    }

    #[test]
    fn test_add_party_extends_round() {
        let barrier = RoundBarrier::new();
        barrier.arm(1);
        barrier.add_party();

        assert!(!barrier.release_one());
        assert!(barrier.release_one());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_when_unarmed() {
        let barrier = RoundBarrier::new();
        tokio::time::timeout(Duration::from_millis(100), barrier.wait())
            .await
            .expect("unarmed barrier should not block");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_survives_immediate_rearm() {
        let barrier = Arc::new(RoundBarrier::new());
        barrier.arm(1);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        barrier.release_one();
        barrier.arm(3);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should observe the release")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_releases_waiter() {
        let barrier = Arc::new(RoundBarrier::new());
        barrier.arm(4);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        barrier.drain();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain should release the waiter")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_release_sees_earlier_release() {
        let barrier = RoundBarrier::new();
        barrier.arm(1);
        let seen = barrier.generation();

        // released and re-armed before the waiter shows up
        barrier.release_one();
        barrier.arm(2);

        tokio::time::timeout(Duration::from_millis(100), barrier.wait_for_release(seen))
            .await
            .expect("a release after `seen` should not block");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_release_blocks_while_armed() {
        let barrier = Arc::new(RoundBarrier::new());
        barrier.arm(2);
        let seen = barrier.generation();

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait_for_release(seen).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        barrier.release_one();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!waiter.is_finished());

        barrier.release_one();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("second release trips the barrier")
            .unwrap();
    }
}
