//! In-process link cache backed by moka.
//!
//! Per-entry TTL comes through an `Expiry` policy: each entry carries the
//! TTL the resolver computed for it (capped by the link's remaining
//! lifetime), with ±10% jitter to avoid synchronized expiry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use rand::Rng;
use tracing::debug;

use super::traits::{CacheResult, LinkCache};
use crate::storage::Link;

/// TTL of negative entries, seconds.
const NOT_FOUND_TTL: u64 = 60;

#[derive(Clone)]
enum Cached {
    Link(Box<Link>),
    NotFound,
}

#[derive(Clone)]
struct Entry {
    value: Cached,
    ttl_secs: u64,
}

struct EntryExpiry;

impl EntryExpiry {
    /// ±10% jitter
    fn apply_jitter(ttl_secs: u64) -> u64 {
        if ttl_secs == 0 {
            return 0;
        }
        let jitter_range = (ttl_secs / 10).max(1);
        let jitter = rand::rng().random_range(0..=jitter_range * 2);
        ttl_secs.saturating_sub(jitter_range).saturating_add(jitter)
    }
}

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(Duration::from_secs(Self::apply_jitter(value.ttl_secs)))
    }
}

pub struct MemoryLinkCache {
    inner: Cache<String, Entry>,
}

impl MemoryLinkCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        debug!("MemoryLinkCache initialized with max capacity: {}", max_capacity);
        Self { inner }
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait]
impl LinkCache for MemoryLinkCache {
    async fn get(&self, key: &str) -> CacheResult {
        match self.inner.get(key).await {
            Some(entry) => match entry.value {
                Cached::Link(link) => CacheResult::Found(*link),
                Cached::NotFound => CacheResult::NotFound,
            },
            None => CacheResult::Miss,
        }
    }

    async fn insert(&self, key: &str, value: Link, ttl_secs: u64) {
        self.inner
            .insert(
                key.to_string(),
                Entry {
                    value: Cached::Link(Box::new(value)),
                    ttl_secs,
                },
            )
            .await;
    }

    async fn mark_not_found(&self, key: &str) {
        self.inner
            .insert(
                key.to_string(),
                Entry {
                    value: Cached::NotFound,
                    ttl_secs: NOT_FOUND_TTL,
                },
            )
            .await;
    }

    async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    async fn invalidate_all(&self) {
        // Lazy in moka: entries are marked and collected asynchronously.
        self.inner.invalidate_all();
    }

    async fn ping(&self) -> bool {
        true
    }
}
