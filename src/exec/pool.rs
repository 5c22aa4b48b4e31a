// src/exec/pool.rs

//! Bounded pool of process execution slots.
//!
//! The pool limits how many external programs run at once (a semaphore with
//! `max_slots` permits) and keeps a small record per command signature so
//! idle signatures can be torn down after `idle_timeout`. Records never
//! outnumber `max_slots`: when a new signature arrives at capacity the least
//! recently used idle record is evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("process pool is closed")]
    Closed,
}

#[derive(Debug, Clone)]
struct SlotEntry {
    in_use: usize,
    last_used: Instant,
    uses: u64,
}

#[derive(Debug)]
struct PoolInner {
    semaphore: Arc<Semaphore>,
    slots: Mutex<HashMap<String, SlotEntry>>,
    max_slots: usize,
    idle_timeout: Duration,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Signature records currently held.
    pub live_slots: usize,
    /// Slots checked out right now.
    pub in_flight: usize,
    pub available_permits: usize,
}

/// Clonable handle; clones share the same slots.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    inner: Arc<PoolInner>,
}

/// A checked-out slot. Returned to the pool on drop.
#[derive(Debug)]
pub struct PoolSlot {
    signature: String,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PoolSlot {
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.pool.check_in(&self.signature);
    }
}

impl ProcessPool {
    pub fn new(max_slots: usize, idle_timeout: Duration) -> Self {
        let max_slots = max_slots.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(max_slots)),
                slots: Mutex::new(HashMap::new()),
                max_slots,
                idle_timeout,
            }),
        }
    }

    pub fn max_slots(&self) -> usize {
        self.inner.max_slots
    }

    /// Wait for a free slot for `signature`.
    pub async fn acquire(&self, signature: &str) -> Result<PoolSlot, PoolError> {
        self.inner.sweep_idle();

        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        self.inner.check_out(signature);
        trace!(signature, "acquired pool slot");

        Ok(PoolSlot {
            signature: signature.to_string(),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Return a slot early. Dropping it has the same effect.
    pub fn release(&self, slot: PoolSlot) {
        drop(slot);
    }

    /// Tear down idle records older than the idle timeout.
    pub fn sweep_idle(&self) -> usize {
        self.inner.sweep_idle()
    }

    /// Run `sweep_idle` every `period` until the pool is dropped or closed.
    pub fn spawn_idle_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if inner.semaphore.is_closed() {
                    break;
                }
                inner.sweep_idle();
            }
            debug!("idle sweeper stopped");
        })
    }

    /// Reject every further `acquire`. Slots already handed out stay valid.
    pub fn close(&self) {
        self.inner.semaphore.close();
        self.inner.lock().retain(|_, entry| entry.in_use > 0);
        debug!("process pool closed");
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.inner.lock();
        PoolStats {
            live_slots: slots.len(),
            in_flight: slots.values().map(|e| e.in_use).sum(),
            available_permits: self.inner.semaphore.available_permits(),
        }
    }

    /// Times `signature` has been checked out while its record was live.
    pub fn uses(&self, signature: &str) -> Option<u64> {
        self.inner.lock().get(signature).map(|e| e.uses)
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, SlotEntry>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_out(&self, signature: &str) {
        let now = Instant::now();
        let mut slots = self.lock();

        if let Some(entry) = slots.get_mut(signature) {
            entry.in_use += 1;
            entry.uses += 1;
            entry.last_used = now;
            return;
        }

        if slots.len() >= self.max_slots {
            // Holding a permit guarantees at least one record is idle.
            let lru = slots
                .iter()
                .filter(|(_, e)| e.in_use == 0)
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(key) = lru {
                debug!(signature = %key, "evicting least recently used pool slot");
                slots.remove(&key);
            }
        }

        slots.insert(
            signature.to_string(),
            SlotEntry {
                in_use: 1,
                last_used: now,
                uses: 1,
            },
        );
    }

    fn check_in(&self, signature: &str) {
        let mut slots = self.lock();
        if let Some(entry) = slots.get_mut(signature) {
            entry.in_use = entry.in_use.saturating_sub(1);
            entry.last_used = Instant::now();
        }
        trace!(signature, "released pool slot");
    }

    fn sweep_idle(&self) -> usize {
        let timeout = self.idle_timeout;
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, e| e.in_use > 0 || e.last_used.elapsed() < timeout);
        let removed = before - slots.len();
        if removed > 0 {
            debug!(removed, "swept idle pool slots");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounds_concurrent_slots() {
        let pool = ProcessPool::new(2, Duration::from_secs(30));
        let a = pool.acquire("ls").await.unwrap();
        let _b = pool.acquire("cat").await.unwrap();
        assert_eq!(pool.stats().available_permits, 0);

        let third = tokio::time::timeout(Duration::from_millis(30), pool.acquire("ls")).await;
        assert!(third.is_err(), "third acquire should wait");

        pool.release(a);
        let c = tokio::time::timeout(Duration::from_millis(200), pool.acquire("ls"))
            .await
            .expect("slot freed")
            .unwrap();
        assert_eq!(c.signature(), "ls");
        assert_eq!(pool.uses("ls"), Some(2));
    }

    #[tokio::test]
    async fn idle_records_are_swept() {
        let pool = ProcessPool::new(4, Duration::ZERO);
        let held = pool.acquire("held").await.unwrap();
        drop(pool.acquire("idle").await.unwrap());

        assert_eq!(pool.sweep_idle(), 1);
        let stats = pool.stats();
        assert_eq!(stats.live_slots, 1);
        assert_eq!(stats.in_flight, 1);
        drop(held);
    }

    #[tokio::test]
    async fn fresh_records_survive_sweep() {
        let pool = ProcessPool::new(4, Duration::from_secs(3600));
        drop(pool.acquire("x").await.unwrap());
        assert_eq!(pool.sweep_idle(), 0);
        assert_eq!(pool.stats().live_slots, 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_at_capacity() {
        let pool = ProcessPool::new(2, Duration::from_secs(3600));
        drop(pool.acquire("a").await.unwrap());
        tokio::time::sleep(Duration::from_millis(2)).await;
        drop(pool.acquire("b").await.unwrap());
        drop(pool.acquire("c").await.unwrap());

        assert_eq!(pool.stats().live_slots, 2);
        assert_eq!(pool.uses("a"), None);
        assert_eq!(pool.uses("b"), Some(1));
        assert_eq!(pool.uses("c"), Some(1));
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquire() {
        let pool = ProcessPool::new(1, Duration::from_secs(1));
        pool.close();
        assert_eq!(pool.acquire("x").await.unwrap_err(), PoolError::Closed);
    }

    #[tokio::test]
    async fn clones_share_slots() {
        let pool = ProcessPool::new(1, Duration::from_secs(1));
        let other = pool.clone();
        let _slot = pool.acquire("x").await.unwrap();
        assert_eq!(other.stats().available_permits, 0);
    }
}
