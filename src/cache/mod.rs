//! Link cache layer
//!
//! The resolver consults the cache before the store; entries live for at
//! most the configured TTL (300 s default) and are invalidated on link
//! update and delete. Cache unavailability degrades to store reads.
//!
//! Keys: `link:{code}` for plain lookups, `link:{slug}:{code}` for
//! template-scoped lookups.

mod memory;
mod null;
mod redis;
pub mod traits;

pub use memory::MemoryLinkCache;
pub use null::NullLinkCache;
pub use redis::RedisLinkCache;
pub use traits::{CacheResult, LinkCache};

use std::sync::Arc;

use tracing::warn;

use crate::config::CacheConfig;

/// Cache key for a short code, optionally scoped by a template slug.
pub fn link_cache_key(slug: Option<&str>, code: &str) -> String {
    match slug {
        Some(slug) => format!("link:{}:{}", slug, code),
        None => format!("link:{}", code),
    }
}

/// Build the configured cache backend.
///
/// A redis connection failure is a warning, not a startup failure: the
/// service runs uncached rather than not at all.
pub async fn create_cache(config: &CacheConfig) -> Arc<dyn LinkCache> {
    match config.cache_type.as_str() {
        "redis" => match RedisLinkCache::connect(&config.redis_url, &config.key_prefix).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!("Redis cache unavailable, continuing without cache: {}", e);
                Arc::new(NullLinkCache)
            }
        },
        "memory" => Arc::new(MemoryLinkCache::new(config.memory_capacity)),
        "none" => Arc::new(NullLinkCache),
        other => {
            warn!("Unknown cache type '{}', disabling cache", other);
            Arc::new(NullLinkCache)
        }
    }
}
