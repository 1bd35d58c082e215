use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::info;

use crate::{QueueResult, ResqueConfig, backend::StoreBackend};

/// Redis-backed store using an auto-reconnecting connection manager
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to a Redis URL such as `redis://127.0.0.1:6379/0`
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("Connected to redis store at {}", redact(url));
        Ok(Self { manager })
    }

    /// Connect using the redis section of a dispatcher configuration
    pub async fn from_config(config: &ResqueConfig) -> QueueResult<Self> {
        Self::connect(&config.redis.url()).await
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

/// Strip credentials before a URL is logged
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl StoreBackend for RedisStore {
    async fn rpush(&self, key: &str, value: &str) -> QueueResult<usize> {
        Ok(self.conn().rpush::<_, _, usize>(key, value).await?)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>> {
        Ok(self.conn().lrange::<_, Vec<String>>(key, start, stop).await?)
    }

    async fn llen(&self, key: &str) -> QueueResult<usize> {
        Ok(self.conn().llen::<_, usize>(key).await?)
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> QueueResult<usize> {
        Ok(self.conn().lrem::<_, _, usize>(key, count, value).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> QueueResult<bool> {
        let added: usize = self.conn().sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> QueueResult<bool> {
        let removed: usize = self.conn().srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> QueueResult<Vec<String>> {
        let mut members: Vec<String> = self.conn().smembers(key).await?;
        members.sort();
        Ok(members)
    }

    async fn scard(&self, key: &str) -> QueueResult<usize> {
        Ok(self.conn().scard::<_, usize>(key).await?)
    }

    async fn sismember(&self, key: &str, member: &str) -> QueueResult<bool> {
        Ok(self.conn().sismember::<_, _, bool>(key, member).await?)
    }

    async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        Ok(self.conn().get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> QueueResult<()> {
        self.conn().set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> QueueResult<bool> {
        let removed: usize = self.conn().del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> QueueResult<bool> {
        Ok(self.conn().exists::<_, bool>(key).await?)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> QueueResult<bool> {
        let added: usize = self.conn().zadd(key, member, score).await?;
        Ok(added > 0)
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>> {
        Ok(self.conn().zrange::<_, Vec<String>>(key, start, stop).await?)
    }

    async fn zrem(&self, key: &str, member: &str) -> QueueResult<bool> {
        let removed: usize = self.conn().zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn zcard(&self, key: &str) -> QueueResult<usize> {
        Ok(self.conn().zcard::<_, usize>(key).await?)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
