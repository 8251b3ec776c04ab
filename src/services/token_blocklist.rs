use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum BlocklistError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Revoked token ids, remembered until the token would have expired anyway.
#[async_trait]
pub trait TokenBlocklist: Send + Sync {
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<(), BlocklistError>;
    async fn is_revoked(&self, jti: &str) -> Result<bool, BlocklistError>;
}

const KEY_PREFIX: &str = "dvota:revoked:";

pub struct RedisTokenBlocklist {
    connection: ConnectionManager,
}

impl RedisTokenBlocklist {
    pub async fn connect(redis_url: &str) -> Result<Self, BlocklistError> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl TokenBlocklist for RedisTokenBlocklist {
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<(), BlocklistError> {
        let mut conn = self.connection.clone();
        // Redis rejects EX 0
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(format!("{KEY_PREFIX}{jti}"), "1", seconds)
            .await?;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, BlocklistError> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(format!("{KEY_PREFIX}{jti}")).await?;
        Ok(exists)
    }
}

/// Process-local blocklist used when no Redis URL is configured.
#[derive(Default)]
pub struct InMemoryTokenBlocklist {
    entries: RwLock<HashMap<String, Instant>>,
}

impl InMemoryTokenBlocklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlocklist for InMemoryTokenBlocklist {
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<(), BlocklistError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, expires_at| *expires_at > now);
        entries.insert(jti.to_string(), now + ttl);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, BlocklistError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(jti)
            .map(|expires_at| *expires_at > Instant::now())
            .unwrap_or(false))
    }
}
