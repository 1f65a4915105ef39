//! Redis-based session store implementation.
//!
//! This module provides an ephemeral session store using Redis with TTL-based expiration.
//!
//! # Architecture
//!
//! Sessions are stored in Redis with:
//! - **Key**: `session:{token}` → JSON-serialized [`Session`]
//! - **TTL**: Configurable expiration (default 24 hours, sliding window:
//!   every save resets it)
//!
//! Sessions are JSON because `creds` holds an arbitrary `serde_json::Value`,
//! which non-self-describing formats such as bincode cannot decode.
//!
//! # Example
//!
//! ```no_run
//! use keyward_auth::stores::RedisSessionStore;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisSessionStore::new("redis://127.0.0.1:6379", Duration::from_secs(86_400)).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{Session, SessionToken};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Redis-based session store with TTL-based expiration.
///
/// Connection pooling via `ConnectionManager`; clones share the connection.
#[derive(Clone)]
pub struct RedisSessionStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,

    /// Lifetime of an entry after its last save.
    ttl: Duration,
}

impl RedisSessionStore {
    /// Create a new Redis session store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `ttl` - Session lifetime, renewed on every save
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AuthError::SessionStoreError(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::SessionStoreError(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        Ok(Self { conn_manager, ttl })
    }

    /// Get the Redis key for a session.
    fn session_key(token: &SessionToken) -> String {
        format!("session:{}", token.as_str())
    }

    /// TTL in whole seconds, at least one.
    fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

impl SessionStore for RedisSessionStore {
    async fn load(&self, token: &SessionToken) -> Result<Option<Session>> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(token);

        let payload: Option<String> = conn.get(&key).await.map_err(|e| {
            AuthError::SessionStoreError(format!("Failed to get session from Redis: {e}"))
        })?;

        payload
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| AuthError::SerializationError(e.to_string()))
            })
            .transpose()
    }

    async fn save(&self, token: &SessionToken, session: &Session) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(token);

        let json =
            serde_json::to_string(session).map_err(|e| AuthError::SerializationError(e.to_string()))?;

        let (): () = conn
            .set_ex(&key, json, self.ttl_seconds())
            .await
            .map_err(|e| AuthError::SessionStoreError(format!("Failed to save session: {e}")))?;

        tracing::debug!(ttl_seconds = self.ttl_seconds(), "Saved session in Redis");
        Ok(())
    }

    async fn flush(&self, token: &SessionToken) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(token);

        let removed: u64 = conn
            .del(&key)
            .await
            .map_err(|e| AuthError::SessionStoreError(format!("Failed to delete session: {e}")))?;

        tracing::debug!(removed, "Flushed session from Redis");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_format() {
        let token = SessionToken("abc".to_string());
        assert_eq!(RedisSessionStore::session_key(&token), "session:abc");
    }
}
