// src/engine/cache.rs

//! Memo of successful external command results.
//!
//! Keyed by the exact command name and ordered arguments. Only results that
//! succeeded and had no redirection are stored. Entries expire after `ttl`
//! (checked on read), and once `capacity` is reached the oldest entry by
//! insertion time makes room, after expired entries are purged.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::engine::result::CommandResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: String,
    args: Vec<String>,
}

impl CacheKey {
    fn new(name: &str, args: &[String]) -> Self {
        Self {
            name: name.to_string(),
            args: args.to_vec(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    result: CommandResult,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct CommandCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    capacity: usize,
    ttl: Duration,
}

impl CommandCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached result for exactly `name` + `args`, if present and fresh.
    pub fn get(&self, name: &str, args: &[String]) -> Option<CommandResult> {
        let key = CacheKey::new(name, args);
        let mut entries = self.lock();

        let expired = match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                trace!(command = %name, "cache hit");
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(&key);
            trace!(command = %name, "cache entry expired");
        }
        None
    }

    /// Store `result`; returns false if it is not cacheable.
    pub fn put(&self, name: &str, args: &[String], result: &CommandResult) -> bool {
        if !result.success || result.exit_code != 0 || result.command.redirect.is_some() {
            return false;
        }

        let key = CacheKey::new(name, args);
        let mut entries = self.lock();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() < ttl);

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!(command = %oldest.name, "evicting oldest cache entry");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            Entry {
                result: result.clone(),
                inserted_at: Instant::now(),
            },
        );
        true
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
