//! Sessions shared between sibling sites
//!
//! The bridge only needs to load a session by id and persist it again, so the
//! store is a small trait. Two backends ship with the crate: an in-memory map
//! for single-process deployments and tests, and Redis.

pub mod redis;

pub use self::redis::RedisSessionStore;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};

const PREVIOUS_URL_KEY: &str = "_previous.url";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    #[serde(default)]
    data: HashMap<String, Value>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    /// A session with a freshly generated id
    pub fn fresh() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn previous_url(&self) -> Option<&str> {
        self.data.get(PREVIOUS_URL_KEY).and_then(Value::as_str)
    }

    pub fn set_previous_url(&mut self, url: impl Into<String>) {
        self.data
            .insert(PREVIOUS_URL_KEY.to_string(), Value::String(url.into()));
    }
}

/// Handle to the request's session, inserted by the session bridge
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            id: Arc::from(session.id()),
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, value: Value) {
        self.inner.write().await.insert(key, value);
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().await.remove(key)
    }

    pub async fn previous_url(&self) -> Option<String> {
        self.inner.read().await.previous_url().map(str::to_string)
    }

    pub(crate) async fn set_previous_url(&self, url: String) {
        self.inner.write().await.set_previous_url(url);
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.read().await.clone()
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts.extensions.get::<SessionHandle>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("session bridge is not installed on this route"))
        })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

/// Sessions kept in a process-local map. Each save restarts the entry's
/// lifetime; expired entries are invisible to `load` and dropped on `save`.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, (Session, Instant)>>,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    /// A store whose sessions never expire
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::default(),
            ttl: Some(ttl),
        }
    }

    fn is_live(&self, saved_at: Instant) -> bool {
        self.ttl.map_or(true, |ttl| saved_at.elapsed() < ttl)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|(_, saved_at)| self.is_live(*saved_at))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .filter(|(_, saved_at)| self.is_live(*saved_at))
            .map(|(session, _)| session.clone()))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if self.ttl.is_some() {
            sessions.retain(|_, (_, saved_at)| self.is_live(*saved_at));
        }
        sessions.insert(session.id().to_string(), (session.clone(), Instant::now()));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
