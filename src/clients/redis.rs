use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tokio::time::timeout;
use tracing::info;

use crate::{config::Config, models::event::Stream, traits::SeenCache};

/// Redis-backed [`SeenCache`]. Entries expire after the configured TTL.
#[derive(Clone)]
pub struct RedisSeenCache {
    connection: MultiplexedConnection,
    ttl_seconds: u64,
    call_timeout: Duration,
}

impl RedisSeenCache {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to Redis");

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| anyhow!("Failed to create redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to redis: {}", e))?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            ttl_seconds: config.seen_cache_ttl_seconds,
            call_timeout: config.cache_timeout(),
        })
    }

    fn key(stream: Stream, event_id: i64) -> String {
        format!("{}:{}", stream.cache_prefix(), event_id)
    }

    pub async fn ping(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();

        timeout(
            self.call_timeout,
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow!("Redis ping timed out"))?
        .map_err(|e| anyhow!("Redis ping failed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl SeenCache for RedisSeenCache {
    async fn contains(&self, stream: Stream, event_id: i64) -> Result<bool, Error> {
        let key = Self::key(stream, event_id);
        let mut conn = self.connection.clone();

        let value = timeout(self.call_timeout, conn.get::<_, Option<String>>(&key))
            .await
            .map_err(|_| anyhow!("Timed out reading cached value for {}", key))?
            .map_err(|e| anyhow!("Failed to get cached value for {}: {}", key, e))?;

        Ok(value.is_some())
    }

    async fn insert(&self, stream: Stream, event_id: i64) -> Result<(), Error> {
        let key = Self::key(stream, event_id);
        let mut conn = self.connection.clone();

        timeout(
            self.call_timeout,
            conn.set_ex::<_, _, ()>(&key, "1", self.ttl_seconds),
        )
        .await
        .map_err(|_| anyhow!("Timed out caching {}", key))?
        .map_err(|e| anyhow!("Failed to cache {}: {}", key, e))?;

        Ok(())
    }
}
