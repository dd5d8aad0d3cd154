use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::simulation::SimulationResult;

/// Key-value store for finished simulation results.
///
/// Implementations must tolerate concurrent readers; results are shared as
/// `Arc`s and never mutated after insertion.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<SimulationResult>>;
    fn insert(&self, key: String, value: Arc<SimulationResult>);
    fn clear(&self);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ResultCache for NoopCache {
    fn get(&self, _key: &str) -> Option<Arc<SimulationResult>> {
        None
    }

    fn insert(&self, _key: String, _value: Arc<SimulationResult>) {}

    fn clear(&self) {}
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    value: Arc<SimulationResult>,
}

/// In-process cache with a fixed time-to-live per entry.
#[derive(Debug)]
pub struct InMemoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }
}

impl ResultCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<Arc<SimulationResult>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    fn insert(&self, key: String, value: Arc<SimulationResult>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
