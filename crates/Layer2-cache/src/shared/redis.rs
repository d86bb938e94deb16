//! Redis-backed shared tier

use super::SharedBackend;
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, AsyncIter, Client};
use async_trait::async_trait;
use retain_foundation::{Error, Result};
use std::time::Duration;

/// Shared tier on a Redis server
///
/// Holds one multiplexed connection; each call works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
}

impl RedisBackend {
    /// Open a connection to `url`, giving up after `timeout`
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::open(url).map_err(Error::shared_cache)?;

        let conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| Error::Timeout(format!("connecting to {} took over {:?}", url, timeout)))?
            .map_err(Error::shared_cache)?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl SharedBackend for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _pong: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Error::shared_cache)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(Error::shared_cache)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(Error::shared_cache)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await.map_err(Error::shared_cache)?;
        Ok(removed > 0)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let keys: Vec<String> = {
            let mut conn = self.conn.clone();
            let mut iter: AsyncIter<'_, String> =
                conn.scan_match(pattern).await.map_err(Error::shared_cache)?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(&keys).await.map_err(Error::shared_cache)?;
        tracing::debug!("Deleted {} shared keys matching {}", removed, pattern);
        Ok(removed)
    }
}
