//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of all provider traits
//! for use in unit and integration tests.

pub mod clock;
pub mod oauth;
pub mod session;
pub mod user;

pub use clock::{FixedClock, test_clock};
pub use oauth::{MockOAuth2Provider, consent_state};
pub use session::MockSessionStore;
pub use user::MockUserRepository;

use crate::error::AuthError;

/// Error for a poisoned mock lock.
pub(crate) fn lock_poisoned<T>(_: T) -> AuthError {
    AuthError::InternalError("Mutex lock failed".to_string())
}
