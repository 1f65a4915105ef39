//! Session store trait.

use crate::error::Result;
use crate::state::{Session, SessionToken};

/// Session store.
///
/// Server-side, per-client storage of a [`Session`], addressed by the
/// opaque token the client presents.
///
/// # Implementation Notes
///
/// - A token with nothing stored loads as `Ok(None)`, not as an error
/// - `save` replaces the whole session and refreshes its TTL
/// - `flush` removes every trace of the session; flushing twice is fine
pub trait SessionStore: Send + Sync {
    /// Load a session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Stored data cannot be decoded
    fn load(
        &self,
        token: &SessionToken,
    ) -> impl std::future::Future<Output = Result<Option<Session>>> + Send;

    /// Create or replace a session.
    ///
    /// # Errors
    ///
    /// Returns error if network request or serialization fails.
    fn save(
        &self,
        token: &SessionToken,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Invalidate a session.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    fn flush(
        &self,
        token: &SessionToken,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
