use async_trait::async_trait;
use dcs_core::cache::CacheResult;
use dcs_core::{CacheError, LocalCache};
use redis::AsyncCommands;
use tracing::debug;

/// Local cache backed by the Redis instance running on the check-in workstation.
#[derive(Clone)]
pub struct RedisLocalCache {
    client: redis::Client,
    namespace: String,
}

fn cache_error(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

impl RedisLocalCache {
    pub fn new(connection_string: &str, namespace: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl LocalCache for RedisLocalCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(cache_error)?;
        conn.get(self.key(key)).await.map_err(cache_error)
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(cache_error)?;
        conn.set::<_, _, ()>(self.key(key), value)
            .await
            .map_err(cache_error)?;
        debug!("Local cache write: {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(cache_error)?;
        conn.del::<_, ()>(self.key(key)).await.map_err(cache_error)
    }
}
