//! Authorization checks.
//!
//! Each guard is a plain function returning an [`AuthResult`]; the web
//! layer turns a denial into a 401 or a redirect. The [`DenyReason`] is for
//! logs only and never reaches the client.

use crate::error::Result;
use crate::providers::{User, UserRepository};
use crate::state::{ApiKey, Session};
use chrono::{DateTime, Utc};

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No API key in the request.
    MissingApiKey,
    /// The key is malformed or belongs to no user.
    UnknownApiKey,
    /// The key belongs to a deactivated user.
    InactiveUser,
    /// No session is attached to the request.
    NoSession,
    /// The session holds no unexpired credential.
    SessionExpired,
}

impl DenyReason {
    /// Label for structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::UnknownApiKey => "unknown_api_key",
            Self::InactiveUser => "inactive_user",
            Self::NoSession => "no_session",
            Self::SessionExpired => "session_expired",
        }
    }
}

/// Outcome of a guard.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthResult<T> {
    /// Proceed, with what the guard resolved.
    Allowed(T),
    /// Refuse.
    Denied(DenyReason),
}

impl<T> AuthResult<T> {
    /// Convert to a `std` result.
    ///
    /// # Errors
    ///
    /// Returns the deny reason if the request was refused.
    pub fn into_result(self) -> std::result::Result<T, DenyReason> {
        match self {
            Self::Allowed(value) => Ok(value),
            Self::Denied(reason) => Err(reason),
        }
    }

    /// `true` if the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

/// Resolve an API key to an active user.
///
/// An absent or empty key is refused without touching the store. The key
/// is matched case-insensitively.
///
/// # Errors
///
/// Returns error only if the user store fails.
pub async fn check_api_key<U: UserRepository>(
    users: &U,
    raw_key: Option<&str>,
) -> Result<AuthResult<User>> {
    let raw_key = match raw_key.map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => return Ok(AuthResult::Denied(DenyReason::MissingApiKey)),
    };

    let Some(api_key) = ApiKey::parse(raw_key) else {
        return Ok(AuthResult::Denied(DenyReason::UnknownApiKey));
    };

    Ok(match users.get_user_by_api_key(api_key).await? {
        Some(user) if user.active => AuthResult::Allowed(user),
        Some(_) => AuthResult::Denied(DenyReason::InactiveUser),
        None => AuthResult::Denied(DenyReason::UnknownApiKey),
    })
}

/// Require a session with an unexpired credential.
#[must_use]
pub fn check_session(now: DateTime<Utc>, session: Option<Session>) -> AuthResult<Session> {
    match session {
        None => AuthResult::Denied(DenyReason::NoSession),
        Some(session) if session.is_logged_in(now) => AuthResult::Allowed(session),
        Some(_) => AuthResult::Denied(DenyReason::SessionExpired),
    }
}
