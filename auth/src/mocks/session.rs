//! Mock session store for testing.

use super::lock_poisoned;
use crate::error::Result;
use crate::providers::SessionStore;
use crate::state::{Session, SessionToken};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Mock session store.
///
/// Uses in-memory storage for testing. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MockSessionStore {
    sessions: Arc<Mutex<HashMap<SessionToken, Session>>>,
}

impl MockSessionStore {
    /// Create a new mock session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get count of stored sessions (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self.sessions.lock().map_err(lock_poisoned)?.len())
    }

    /// Stored copy of a session, bypassing the trait (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn snapshot(&self, token: &SessionToken) -> Result<Option<Session>> {
        Ok(self.sessions.lock().map_err(lock_poisoned)?.get(token).cloned())
    }
}

impl SessionStore for MockSessionStore {
    fn load(&self, token: &SessionToken) -> impl Future<Output = Result<Option<Session>>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let token = token.clone();

        async move {
            let sessions_guard = sessions.lock().map_err(lock_poisoned)?;
            Ok(sessions_guard.get(&token).cloned())
        }
    }

    fn save(
        &self,
        token: &SessionToken,
        session: &Session,
    ) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let token = token.clone();
        let session = session.clone();

        async move {
            sessions.lock().map_err(lock_poisoned)?.insert(token, session);
            Ok(())
        }
    }

    fn flush(&self, token: &SessionToken) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let token = token.clone();

        async move {
            sessions.lock().map_err(lock_poisoned)?.remove(&token);
            Ok(())
        }
    }
}
