//! No-op cache used when caching is disabled. Every lookup is a miss.

use async_trait::async_trait;

use super::traits::{CacheResult, LinkCache};
use crate::storage::Link;

pub struct NullLinkCache;

#[async_trait]
impl LinkCache for NullLinkCache {
    async fn get(&self, _key: &str) -> CacheResult {
        CacheResult::Miss
    }

    async fn insert(&self, _key: &str, _value: Link, _ttl_secs: u64) {}

    async fn mark_not_found(&self, _key: &str) {}

    async fn remove(&self, _key: &str) {}

    async fn invalidate_all(&self) {}

    async fn ping(&self) -> bool {
        true
    }
}
