use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use std::time::Duration;

use super::incident_cache::{CacheError, CacheStore};
use super::queue::{QueueError, QueueStore, DEAD_LETTER_CAP, DEAD_LETTER_KEY, DELAYED_KEY, QUEUE_KEY};

/// Moves every due member of the delayed set to the tail of the ready list.
///
/// KEYS[1] = delayed sorted set
/// KEYS[2] = ready list
/// ARGV[1] = now, epoch milliseconds
///
/// Returns the number of promoted items.
const PROMOTE_DUE_SCRIPT: &str = r#"
    local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
    for _, item in ipairs(due) do
        redis.call('ZREM', KEYS[1], item)
        redis.call('RPUSH', KEYS[2], item)
    end
    return #due
"#;

/// Redis backend for both the incident cache and the webhook queue.
///
/// The ready list is consumed with RPUSH/BLPOP. Retries wait in a sorted set
/// scored by due time (epoch milliseconds) and are promoted by a Lua script, so
/// claiming and re-pushing a retry is one atomic step across competing workers.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Opens the client and verifies the server answers PING.
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let store = Self::new(redis_url)?;
        store.health_check().await?;
        Ok(store)
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

#[async_trait]
impl QueueStore for RedisStore {
    async fn push(&self, item: &str) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        conn.rpush::<_, _, ()>(QUEUE_KEY, item).await?;
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn().await?;
        let popped: Option<(String, String)> =
            conn.blpop(QUEUE_KEY, timeout.as_secs_f64()).await?;
        Ok(popped.map(|(_, item)| item))
    }

    async fn schedule(&self, item: &str, delay: Duration) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let due = now_ms() + delay.as_millis() as i64;
        conn.zadd::<_, _, _, ()>(DELAYED_KEY, item, due).await?;
        Ok(())
    }

    async fn promote_due(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn().await?;
        let promoted: usize = redis::Script::new(PROMOTE_DUE_SCRIPT)
            .key(DELAYED_KEY)
            .key(QUEUE_KEY)
            .arg(now_ms())
            .invoke_async(&mut conn)
            .await?;
        Ok(promoted)
    }

    async fn dead_letter(&self, item: &str) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(DEAD_LETTER_KEY, item).await?;
        conn.ltrim::<_, ()>(DEAD_LETTER_KEY, 0, DEAD_LETTER_CAP as isize - 1)
            .await?;
        Ok(())
    }

    async fn len(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;
        let depth: u64 = conn.llen(QUEUE_KEY).await?;
        Ok(depth)
    }
}
