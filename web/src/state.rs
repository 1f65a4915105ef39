//! Application state for Axum handlers.

use keyward_auth::providers::{OAuth2Provider, SessionStore, UserRepository};
use keyward_auth::{AuthConfig, AuthManager, Clock, SystemClock};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Generic over the manager's collaborators so tests can run the real
/// router against in-memory mocks.
pub struct AppState<O, U, S, C = SystemClock>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
    C: Clock,
{
    /// Login state machine and user lookups.
    pub auth: Arc<AuthManager<O, U, S, C>>,
}

impl<O, U, S, C> AppState<O, U, S, C>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
    C: Clock,
{
    /// Create a new application state.
    #[must_use]
    pub fn new(auth: AuthManager<O, U, S, C>) -> Self {
        Self {
            auth: Arc::new(auth),
        }
    }

    /// Shorthand for the manager's configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        self.auth.config()
    }
}

impl<O, U, S, C> Clone for AppState<O, U, S, C>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
    C: Clock,
{
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_auth::mocks::{MockOAuth2Provider, MockSessionStore, MockUserRepository};

    #[test]
    fn test_state_is_clone() {
        // Ensure AppState implements Clone (required for Axum)
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState<MockOAuth2Provider, MockUserRepository, MockSessionStore>>();
    }
}
