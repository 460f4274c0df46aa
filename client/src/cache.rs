//! Time-bounded store for decoded responses.

use log::debug;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    expires: Instant,
}

pub struct ResponseCache {
    enabled: bool,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A clone of the live entry under `key`, if it holds a `T`.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.expires <= Instant::now() {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: String, value: T, ttl: Duration) {
        if !self.enabled || ttl.is_zero() {
            return;
        }
        let entry = Entry {
            value: Arc::new(value),
            expires: Instant::now() + ttl,
        };
        self.entries.lock().insert(key, entry);
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically evicts expired entries until `shutdown` fires.
pub async fn run_sweeper(cache: Arc<ResponseCache>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {
                let evicted = cache.evict_expired();
                if evicted > 0 {
                    debug!("Evicted {} expired cache entries", evicted);
                }
            }
        }
    }
}
