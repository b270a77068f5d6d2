use async_trait::async_trait;

use crate::storage::Link;

/// Cache lookup outcome
#[derive(Debug, Clone)]
pub enum CacheResult {
    /// Key is known to have no link (negative entry)
    NotFound,
    /// Key is not cached; fall through to the store
    Miss,
    /// Cached link
    Found(Link),
}

/// Link cache backend.
///
/// All operations are best-effort: a backend failure is logged by the
/// implementation and behaves like a miss / no-op. The resolver never fails
/// a request because of the cache.
#[async_trait]
pub trait LinkCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult;

    /// Insert a link with the given TTL in seconds.
    async fn insert(&self, key: &str, value: Link, ttl_secs: u64);

    /// Record a short-lived negative entry for a key that resolved to
    /// nothing at the store.
    async fn mark_not_found(&self, key: &str);

    /// Drop a key (link update / delete invalidation).
    async fn remove(&self, key: &str);

    async fn invalidate_all(&self);

    /// Backend liveness for the health probe. An in-process or disabled
    /// backend is always live; a shared backend reports whether it is
    /// currently reachable.
    async fn ping(&self) -> bool;
}
