//! Redis-backed session store

use ::redis::{aio::ConnectionManager, AsyncCommands};
use async_trait::async_trait;
use std::time::Duration;

use super::{Session, SessionStore};
use crate::error::{AppError, Result};

const KEY_PREFIX: &str = "nexus:session";

/// Stores sessions as JSON strings with a sliding TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisSessionStore {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self> {
        let client = ::redis::Client::open(url).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to create Redis client: {}", e))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to connect to Redis: {}", e))
        })?;

        Ok(Self { conn, ttl })
    }

    fn key(id: &str) -> String {
        format!("{}:{}", KEY_PREFIX, id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::key(id)).await?;

        match value {
            Some(v) => {
                let session = serde_json::from_str(&v).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Session deserialize error: {}", e))
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn.clone();
        let serialized = serde_json::to_string(session).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Session serialize error: {}", e))
        })?;

        let _: () = conn
            .set_ex(Self::key(session.id()), serialized, self.ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
