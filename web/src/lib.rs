//! HTTP surface for Keyward.
//!
//! Wraps [`keyward_auth::AuthManager`] in axum handlers and request guards:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            HTTP shell (axum)            │  ← routes, cookies, redirects
//! │  - ApiKeyUser / LoggedIn extractors     │  ← guards
//! │  - AppError → status + JSON body        │
//! ├─────────────────────────────────────────┤
//! │            keyward-auth                 │
//! │  - AuthManager (login, registration)    │  ← providers, sessions, users
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use keyward_web::{router, AppState};
//!
//! let manager = AuthManager::new(environment, config);
//! let app = router(AppState::new(manager));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::AppError;
pub use extractors::{ApiKeyUser, GuardRejection, LoggedIn};
pub use router::router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
