//! # Keyward Authentication
//!
//! Federated OAuth2 login with server-side sessions, and per-user API keys
//! for programmatic access.
//!
//! ## Features
//!
//! - **Two-step OAuth2**: consent redirect, then code exchange and identity lookup
//! - **Registration**: collision-free `(handle, number)` and API-key assignment
//! - **Guards**: session check for browsers, API-key check for programs
//! - **Testable**: every collaborator is a trait with an in-memory mock
//!
//! ## Architecture
//!
//! ```text
//! Browser ──▶ login_step1 ──▶ provider consent ──▶ login_step2
//!                                                    │
//!                      user known ◀──────────────────┤
//!                          │                         ▼
//!                     LoggedIn ◀── register_user ◀── handle
//! ```
//!
//! ## Example: OAuth2 Login
//!
//! ```
//! use keyward_auth::mocks::{
//!     consent_state, MockOAuth2Provider, MockSessionStore, MockUserRepository,
//! };
//! use keyward_auth::providers::ProviderRegistry;
//! use keyward_auth::{AuthConfig, AuthEnvironment, AuthManager, SessionToken};
//!
//! # async fn example() -> keyward_auth::Result<()> {
//! let env = AuthEnvironment::new(
//!     ProviderRegistry::new().with_provider("google", MockOAuth2Provider::new()),
//!     MockUserRepository::new(),
//!     MockSessionStore::new(),
//! );
//! let manager = AuthManager::new(env, AuthConfig::new("https://app.example.com"));
//!
//! // 1. Send the browser to the provider
//! let token = SessionToken::generate();
//! let consent = manager.login_step1(&token, "google", "/").await?;
//!
//! // 2. Provider calls back with a code and the state from step 1
//! let state = consent_state(consent.as_str()).unwrap_or_default();
//! let result = manager.login_step2(&token, "code", &state, "/", true).await;
//! # let _ = (consent, result);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod environment;
pub mod error;
pub mod guards;
pub mod manager;
pub mod providers;
pub mod state;
pub mod stores;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::AuthConfig;
pub use environment::{AuthEnvironment, Clock, SystemClock};
pub use error::{AuthError, Result, UniqueField};
pub use guards::{AuthResult, DenyReason, check_api_key, check_session};
pub use manager::AuthManager;
pub use providers::{PublicUser, User};
pub use state::{
    ApiKey, LoginPhase, LoginRedirect, OAuthFlow, RedirectTarget, Session, SessionToken,
};
