use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, Script};
use tracing::info;

use super::SharedStore;
use crate::error::StoreError;

/// INCR, and set the expiry only when the counter was just created.
const INCR_WITH_EXPIRY_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
";

/// Redis-backed store shared by every gateway instance.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    incr_script: Script,
}

impl RedisStore {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            incr_script: Script::new(INCR_WITH_EXPIRY_SCRIPT),
        }
    }

    /// Create a pool for `url` and verify a connection can be obtained.
    pub async fn connect(url: &str, pool_size: usize, timeout: Duration) -> Result<Self, StoreError> {
        let mut redis_config = deadpool_redis::Config::from_url(url);
        let mut pool_config = PoolConfig::new(pool_size.max(1));
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        pool.get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!(pool_size = pool_size, "Connected to Redis store");
        Ok(Self::new(pool))
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn redis_err(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let count: u64 = self
            .incr_script
            .key(key)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key).await.map_err(redis_err)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .map_err(redis_err)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(redis_err)
    }

    fn mode(&self) -> &'static str {
        "redis"
    }
}
