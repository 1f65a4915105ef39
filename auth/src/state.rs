//! Authentication state types.
//!
//! The server-side [`Session`] is a typed record rather than a free-form
//! map: only the fields the login flow reads or writes exist, and a
//! [`Registration`] can only be produced when every required field is
//! present. All types are `Clone` + serde so session stores can persist them.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Per-user API key: a random 128-bit identifier.
///
/// Rendered as a lower-case hyphenated UUID. Parsing accepts any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKey(pub uuid::Uuid);

impl ApiKey {
    /// Generate a new random `ApiKey`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse a key presented by a client.
    ///
    /// Returns `None` for anything that is not a UUID; callers treat that
    /// exactly like an unknown key.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        uuid::Uuid::parse_str(raw.trim().to_lowercase().as_str())
            .ok()
            .map(Self)
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ApiKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// Opaque token a client presents to address its server-side session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// Generate a new session token from 256 bits of randomness.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Token as presented on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL a handler should send the browser to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget(pub String);

impl RedirectTarget {
    /// Target URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a completed step 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// Where to send the browser.
    pub target: RedirectTarget,

    /// Token the session is now stored under. Differs from the presented
    /// token when a user was bound, since binding rotates the token.
    pub token: SessionToken,
}

/// Which callback route a handshake returns to.
///
/// `Login` binds an existing user at step 2; `Register` only records the
/// identity so a new user can be created from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthFlow {
    /// Callback at `/oauth/{provider}`.
    #[default]
    Login,
    /// Callback at `/register/{provider}`.
    Register,
}

impl OAuthFlow {
    /// `true` for the flow that looks the user up at step 2.
    #[must_use]
    pub const fn does_login(self) -> bool {
        matches!(self, Self::Login)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// Server-held state for one client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Login bookkeeping.
    #[serde(default)]
    pub auth: AuthSection,

    /// Raw token-exchange response from the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creds: Option<serde_json::Value>,

    /// Identity reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ProfileInfo>,

    /// Handle chosen before registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

/// The `auth` part of a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSection {
    /// Provider chosen at step 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Expiry of the provider credential, from the ID-token claims.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires: Option<DateTime<Utc>>,

    /// Key of the user bound to this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,

    /// Where step 1 was asked to return to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,

    /// CSRF `state` sent to the provider at step 1; consumed by step 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
}

/// Name and email reported by the provider's identity endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// Display name.
    pub name: String,

    /// Email address.
    pub email: String,
}

/// Everything `register_user` needs, extracted from a complete session.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Requested handle.
    pub handle: String,

    /// Provider name.
    pub service: String,

    /// Display name.
    pub name: String,

    /// Email address.
    pub email: String,

    /// Credential blob to persist as `auth_data`.
    pub creds: serde_json::Value,
}

/// Where a session stands in the login state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    /// Nothing has happened yet.
    Anonymous,
    /// Step 1 done, waiting for the provider to call back.
    AwaitingProvider,
    /// Step 2 done: identity and expiry are known, no user bound.
    Authenticated,
    /// A user is bound to the session.
    LoggedIn,
    /// Identity known and a handle chosen, registration not yet run.
    PendingRegistration,
}

impl Session {
    /// `true` iff `auth.expires` is strictly after `now`.
    ///
    /// Missing fields mean "not logged in", never an error.
    #[must_use]
    pub fn is_logged_in(&self, now: DateTime<Utc>) -> bool {
        self.auth.expires.is_some_and(|expires| expires > now)
    }

    /// Current position in the login state machine.
    #[must_use]
    pub fn phase(&self, now: DateTime<Utc>) -> LoginPhase {
        if self.is_logged_in(now) {
            if self.auth.api_key.is_some() {
                LoginPhase::LoggedIn
            } else if self.handle.is_some() {
                LoginPhase::PendingRegistration
            } else {
                LoginPhase::Authenticated
            }
        } else if self.auth.service.is_some() {
            LoginPhase::AwaitingProvider
        } else {
            LoginPhase::Anonymous
        }
    }

    /// Registration request, if every required field is present.
    #[must_use]
    pub fn registration(&self) -> Option<Registration> {
        let info = self.info.as_ref()?;
        Some(Registration {
            handle: self.handle.clone()?,
            service: self.auth.service.clone()?,
            name: info.name.clone(),
            email: info.email.clone(),
            creds: self.creds.clone()?,
        })
    }

    /// Clear every field.
    pub fn flush(&mut self) {
        *self = Self::default();
    }

    /// `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
