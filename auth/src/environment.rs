//! Authentication environment.
//!
//! This module defines the environment type for dependency injection
//! into the [`AuthManager`](crate::AuthManager).

use crate::providers::{OAuth2Provider, ProviderRegistry, SessionStore, UserRepository};
use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Every expiry comparison goes through a clock so tests can pin "now".
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Authentication environment.
///
/// Contains all external dependencies of the login flow.
///
/// # Type Parameters
///
/// - `O`: `OAuth2` provider
/// - `U`: User repository
/// - `S`: Session store
/// - `C`: Clock
#[derive(Debug, Clone)]
pub struct AuthEnvironment<O, U, S, C = SystemClock>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
    C: Clock,
{
    /// Configured `OAuth2` providers, by name.
    pub providers: ProviderRegistry<O>,

    /// User repository (`PostgreSQL`).
    pub users: U,

    /// Session store (`Redis`).
    pub sessions: S,

    /// Clock.
    pub clock: C,
}

impl<O, U, S> AuthEnvironment<O, U, S, SystemClock>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
{
    /// Create a new environment on the wall clock.
    #[must_use]
    pub fn new(providers: ProviderRegistry<O>, users: U, sessions: S) -> Self {
        Self {
            providers,
            users,
            sessions,
            clock: SystemClock,
        }
    }
}

impl<O, U, S, C> AuthEnvironment<O, U, S, C>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
    C: Clock,
{
    /// Replace the clock.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> AuthEnvironment<O, U, S, C2> {
        AuthEnvironment {
            providers: self.providers,
            users: self.users,
            sessions: self.sessions,
            clock,
        }
    }
}
