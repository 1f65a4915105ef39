//! Authentication providers.
//!
//! This module defines traits for every external collaborator of the login
//! flow, plus the data they exchange. The [`AuthManager`](crate::AuthManager)
//! depends on these traits only; the runtime provides concrete
//! implementations.
//!
//! ```text
//! ┌────────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │ ProviderRegistry   │    │ SessionStore     │    │ UserRepository   │
//! │  name → OAuth2     │    │  token → Session │    │  email / api_key │
//! │  (Google, mock)    │    │  (Redis, mock)   │    │  (handle,number) │
//! └─────────┬──────────┘    └────────┬─────────┘    └────────┬─────────┘
//!           └──────────────┬─────────┴───────────────────────┘
//!                          ▼
//!                   ┌──────────────┐
//!                   │ AuthManager  │
//!                   └──────────────┘
//! ```
//!
//! This enables:
//! - **Testing**: Use mocks (in-memory, deterministic)
//! - **Production**: Use real services (Google, Redis, PostgreSQL)

use crate::state::ApiKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod google;
pub mod oauth;
pub mod registry;
pub mod session;
pub mod user;

// Re-export provider traits
pub use google::{ClientSecrets, GoogleOAuthProvider};
pub use oauth::OAuth2Provider;
pub use registry::ProviderRegistry;
pub use session::SessionStore;
pub use user::UserRepository;

/// Highest value of the handle disambiguator.
pub const MAX_HANDLE_NUMBER: u16 = 9999;

/// Durable user record.
///
/// Created only by registration; refreshed on every successful OAuth login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Display name.
    pub name: String,

    /// Email address (unique).
    pub email: String,

    /// API key (unique, never reassigned).
    pub api_key: ApiKey,

    /// Chosen handle.
    pub handle: String,

    /// Disambiguator in `0..=9999`; `(handle, number)` is unique.
    pub number: u16,

    /// Provider the user registered with.
    pub service: String,

    /// Serialized provider credentials.
    pub auth_data: String,

    /// Inactive users are refused by the API-key guard.
    pub active: bool,
}

impl User {
    /// `handle#0042` style identifier.
    #[must_use]
    pub fn display_handle(&self) -> String {
        format!("{}#{:04}", self.handle, self.number)
    }

    /// View without credentials, for API responses.
    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            name: self.name.clone(),
            email: self.email.clone(),
            handle: self.display_handle(),
            service: self.service.clone(),
        }
    }
}

/// What API responses reveal about a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    /// Display name.
    pub name: String,

    /// Email address.
    pub email: String,

    /// `handle#number`.
    pub handle: String,

    /// Provider name.
    pub service: String,
}

/// Result of an authorization-code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBundle {
    /// Raw token endpoint response, persisted as the credential blob.
    pub raw: serde_json::Value,

    /// Access token for the identity endpoint.
    pub access_token: String,

    /// Access token expiry (from `expires_in`).
    pub access_expires_at: Option<DateTime<Utc>>,

    /// `exp` claim of the ID token.
    pub id_token_expires_at: Option<DateTime<Utc>>,
}

impl TokenBundle {
    /// `true` if the access token can no longer be used at `now`.
    #[must_use]
    pub fn is_access_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.access_expires_at.is_some_and(|at| at <= now)
    }

    /// Expiry recorded in the session: the ID-token claim, falling back to
    /// the access token lifetime when the provider sent no ID token.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.id_token_expires_at.or(self.access_expires_at)
    }
}
