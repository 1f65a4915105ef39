//! Error types for authentication and authorization operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Unique column that a store rejected an insert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    /// `users.api_key`
    ApiKey,
    /// `users.(handle, number)`
    Handle,
    /// `users.email`
    Email,
}

impl UniqueField {
    /// Column name used in log output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Handle => "handle",
            Self::Email => "email",
        }
    }
}

/// Error taxonomy for login, registration and the stores behind them.
///
/// Lookups that find nothing are **not** errors: every repository returns
/// `Ok(None)` for a miss. Guards never surface these errors to callers
/// either; they translate a denial into a `401` or a redirect.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // OAuth Errors
    // ═══════════════════════════════════════════════════════════

    /// Unknown provider, or a provider whose client secrets could not be loaded.
    #[error("Authentication service is not supported: {provider}")]
    UnsupportedProvider {
        /// Provider name as requested
        provider: String,
    },

    /// Step 2 was called before step 1 stored a provider in the session.
    #[error("No OAuth flow in progress for this session")]
    OAuthStateMissing,

    /// The `state` returned by the provider is not the one issued at step 1.
    #[error("OAuth state parameter does not match")]
    OAuthStateInvalid,

    /// Code exchange or user-info call failed.
    #[error("OAuth token exchange failed: {0}")]
    TokenExchange(String),

    // ═══════════════════════════════════════════════════════════
    // Registration Errors
    // ═══════════════════════════════════════════════════════════

    /// The provider identity has no matching user; the session was cleared.
    #[error("User is not registered")]
    UserNotRegistered,

    /// No free `(handle, number)` pair or API key could be claimed.
    #[error("Unable to register user with handle {handle}")]
    RegistrationExhausted {
        /// Handle whose namespace is exhausted
        handle: String,
    },

    /// Handle failed validation.
    #[error("Invalid handle: {reason}")]
    InvalidHandle {
        /// Why the handle was rejected
        reason: String,
    },

    /// A store rejected an insert because a unique column already holds the value.
    #[error("Duplicate value for unique field {}", .0.as_str())]
    Conflict(UniqueField),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// User store operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    SessionStoreError(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deployment configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Returns `true` if this error is caused by the caller's input rather
    /// than by the system.
    ///
    /// # Examples
    ///
    /// ```
    /// # use keyward_auth::AuthError;
    /// assert!(AuthError::UserNotRegistered.is_user_error());
    /// assert!(!AuthError::DatabaseError("down".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedProvider { .. }
                | Self::OAuthStateMissing
                | Self::OAuthStateInvalid
                | Self::UserNotRegistered
                | Self::RegistrationExhausted { .. }
                | Self::InvalidHandle { .. }
        )
    }

    /// Returns `true` if repeating the same operation may succeed.
    ///
    /// Only store-level uniqueness races qualify; exhausted handles are
    /// permanent until the caller picks another handle.
    ///
    /// # Examples
    ///
    /// ```
    /// # use keyward_auth::{AuthError, error::UniqueField};
    /// assert!(AuthError::Conflict(UniqueField::ApiKey).is_retryable());
    /// assert!(!AuthError::RegistrationExhausted { handle: "a".into() }.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict(UniqueField::ApiKey | UniqueField::Handle)
        )
    }
}
