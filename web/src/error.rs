//! Error types for web handlers.
//!
//! [`AppError`] bridges [`AuthError`] and HTTP responses by implementing
//! Axum's `IntoResponse`. Clients get a status and a short JSON body; store
//! and provider details only reach the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyward_auth::{AuthError, UniqueField};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```
/// use keyward_web::AppError;
///
/// let err = AppError::validation("handle is empty");
/// assert_eq!(err.to_string(), "[VALIDATION_ERROR] handle is empty");
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// HTTP status this error renders as.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST")
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "UNAUTHORIZED")
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), "CONFLICT")
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR",
        )
    }

    /// Create a 502 Bad Gateway error (identity provider failed).
    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message.into(), "PROVIDER_ERROR")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR",
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    /// Error code (for client error handling).
    code: &'a str,
    /// Human-readable error message.
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let source = self.source.as_ref().map(|e| format!("{e:#}"));
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                error = source.as_deref().unwrap_or("none"),
                "Request failed"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: &self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::UnsupportedProvider { provider } => {
                Self::bad_request(format!("Unsupported provider: {provider}"))
            }
            AuthError::OAuthStateMissing => {
                Self::bad_request("No login in progress for this session")
            }
            AuthError::OAuthStateInvalid => {
                Self::bad_request("Login response does not belong to this session")
            }
            AuthError::TokenExchange(_) => {
                Self::bad_gateway("Identity provider request failed").with_source(err)
            }
            AuthError::UserNotRegistered => Self::unauthorized("User is not registered"),
            AuthError::RegistrationExhausted { handle } => {
                Self::conflict(format!("No free number left for handle {handle}"))
            }
            AuthError::InvalidHandle { reason } => Self::validation(reason.clone()),
            AuthError::Conflict(UniqueField::Email) => {
                Self::conflict("Email address is already registered")
            }
            AuthError::Conflict(_)
            | AuthError::DatabaseError(_)
            | AuthError::SessionStoreError(_)
            | AuthError::SerializationError(_)
            | AuthError::Configuration(_)
            | AuthError::InternalError(_) => {
                Self::internal("An internal error occurred").with_source(err)
            }
        }
    }
}
