//! Redis link cache.
//!
//! Uses `ConnectionManager` for automatic reconnection. Errors degrade to a
//! cache miss so the resolver falls through to the store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error, trace, warn};

use super::traits::{CacheResult, LinkCache};
use crate::errors::{LinkFortyError, Result};
use crate::storage::Link;

/// Sentinel value for negative entries.
const NOT_FOUND_SENTINEL: &str = "__not_found__";

/// TTL of negative entries, seconds.
const NOT_FOUND_TTL: u64 = 60;

pub struct RedisLinkCache {
    /// ConnectionManager reconnects on its own and is cheap to clone.
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisLinkCache {
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        debug!("Initializing RedisLinkCache with prefix: '{}'", key_prefix);

        let client = redis::Client::open(url).map_err(|e| {
            LinkFortyError::cache_connection(format!("failed to create Redis client: {e}"))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            LinkFortyError::cache_connection(format!("failed to create ConnectionManager: {e}"))
        })?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl LinkCache for RedisLinkCache {
    async fn get(&self, key: &str) -> CacheResult {
        let redis_key = self.make_key(key);
        let mut conn = self.connection.clone();

        let result: redis::RedisResult<Option<String>> = conn.get(&redis_key).await;

        match result {
            Ok(Some(data)) if data == NOT_FOUND_SENTINEL => CacheResult::NotFound,
            Ok(Some(data)) => match serde_json::from_str::<Link>(&data) {
                Ok(link) => {
                    trace!("Cache hit: {}", key);
                    CacheResult::Found(link)
                }
                Err(e) => {
                    error!("Failed to deserialize cached link '{}': {}", key, e);
                    // Drop the corrupt entry
                    let _ = conn.del::<&str, ()>(&redis_key).await;
                    CacheResult::Miss
                }
            },
            Ok(None) => CacheResult::Miss,
            Err(e) => {
                warn!("Redis get error (will auto-reconnect): {}", e);
                CacheResult::Miss
            }
        }
    }

    async fn insert(&self, key: &str, value: Link, ttl_secs: u64) {
        let redis_key = self.make_key(key);
        let mut conn = self.connection.clone();

        match serde_json::to_string(&value) {
            Ok(serialized) => {
                if let Err(e) = conn
                    .set_ex::<String, String, ()>(redis_key, serialized, ttl_secs)
                    .await
                {
                    warn!("Failed to cache link '{}': {}", key, e);
                } else {
                    trace!("Cached link: {} (TTL: {}s)", key, ttl_secs);
                }
            }
            Err(e) => {
                error!("Failed to serialize link for '{}': {}", key, e);
            }
        }
    }

    async fn mark_not_found(&self, key: &str) {
        let redis_key = self.make_key(key);
        let mut conn = self.connection.clone();

        if let Err(e) = conn
            .set_ex::<String, &str, ()>(redis_key, NOT_FOUND_SENTINEL, NOT_FOUND_TTL)
            .await
        {
            warn!("Failed to set negative entry for '{}': {}", key, e);
        }
    }

    async fn remove(&self, key: &str) {
        let redis_key = self.make_key(key);
        let mut conn = self.connection.clone();

        match conn.del::<String, i32>(redis_key).await {
            Ok(_) => trace!("Invalidated cache key: {}", key),
            Err(e) => warn!("Failed to invalidate cache key '{}': {}", key, e),
        }
    }

    async fn ping(&self) -> bool {
        let mut conn = self.connection.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Redis ping failed: {}", e);
                false
            }
        }
    }

    async fn invalidate_all(&self) {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", self.key_prefix);
        let mut deleted = 0u64;
        let mut cursor: u64 = 0;

        loop {
            let scan_result: redis::RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            match scan_result {
                Ok((new_cursor, keys)) => {
                    if !keys.is_empty() {
                        if let Ok(n) = conn.del::<&[String], u64>(&keys).await {
                            deleted += n;
                        }
                    }
                    cursor = new_cursor;
                    if cursor == 0 {
                        break;
                    }
                }
                Err(e) => {
                    error!("SCAN failed during invalidate_all: {}", e);
                    break;
                }
            }
        }

        debug!("Invalidated {} keys with prefix: {}", deleted, self.key_prefix);
    }
}
