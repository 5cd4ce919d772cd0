//! Decision cache
//!
//! Memoizes cacheable (non-Prompt) decisions keyed by
//! `operation|uri|tool`, each entry carrying its own TTL. Lookups validate
//! freshness themselves, so a stale entry is never returned even between
//! sweeps; the periodic sweeper only reclaims memory and its failure
//! cannot affect correctness.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::rules::PermissionResult;

/// One cached decision
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: PermissionResult,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// TTL map of evaluation results
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a live entry; expired entries are treated as absent
    pub async fn get(&self, key: &str) -> Option<PermissionResult> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.result.clone())
    }

    /// Store a decision with the given lifetime
    pub async fn insert(&self, key: impl Into<String>, result: PermissionResult, ttl: Duration) {
        let entry = CacheEntry {
            result,
            inserted_at: Instant::now(),
            ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Drop every expired entry; returns how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Handle to the background sweep task; aborts the task when dropped
///
/// Hosts that bring their own scheduler can skip `spawn_sweeper` and call
/// `sweep_expired` themselves.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a periodic sweep of the given cache
pub fn spawn_sweeper(cache: Arc<DecisionCache>, period: Duration) -> SweeperHandle {
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; skip it so a fresh engine does
        // not sweep an empty cache
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.sweep_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "swept expired cache entries");
            }
        }
    });
    SweeperHandle { task }
}
