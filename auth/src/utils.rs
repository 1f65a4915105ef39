//! Utility functions for authentication.

use crate::error::{AuthError, Result};
use base64::Engine;
use serde::Deserialize;

/// Longest accepted handle, in characters.
pub const MAX_HANDLE_LEN: usize = 32;

/// Claims read from an OpenID Connect ID token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    /// Subject identifier.
    #[serde(default)]
    pub sub: Option<String>,

    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Decode the payload of an ID token without verifying its signature.
///
/// Only used on tokens received directly from the provider's token
/// endpoint over TLS, where OpenID Connect Core §3.1.3.7 allows the TLS
/// server validation to stand in for signature checks.
///
/// # Errors
///
/// Returns `AuthError::TokenExchange` if the token is not a three-part JWT
/// or its payload is not valid JSON with an `exp` claim.
pub fn decode_id_token_claims(id_token: &str) -> Result<IdTokenClaims> {
    let mut parts = id_token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(AuthError::TokenExchange("ID token is not a JWT".into())),
    };

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::TokenExchange(format!("ID token payload: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::TokenExchange(format!("ID token claims: {e}")))
}

/// Generate the CSRF `state` parameter for one OAuth handshake.
///
/// 32 random bytes, base64url without padding, so the value needs no
/// escaping in a query string.
#[must_use]
pub fn generate_csrf_state() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Validate a handle chosen at registration.
///
/// Handles are 1 to 32 characters of ASCII letters, digits, `_`, `-` or `.`.
///
/// # Errors
///
/// Returns `AuthError::InvalidHandle` describing the first violated rule.
///
/// # Examples
///
/// ```
/// use keyward_auth::utils::validate_handle;
///
/// assert!(validate_handle("alice").is_ok());
/// assert!(validate_handle("re_searcher-01").is_ok());
/// assert!(validate_handle("").is_err());
/// assert!(validate_handle("has space").is_err());
/// ```
pub fn validate_handle(handle: &str) -> Result<()> {
    if handle.is_empty() {
        return Err(AuthError::InvalidHandle {
            reason: "handle is empty".to_string(),
        });
    }

    if handle.chars().count() > MAX_HANDLE_LEN {
        return Err(AuthError::InvalidHandle {
            reason: format!("handle is longer than {MAX_HANDLE_LEN} characters"),
        });
    }

    let valid = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.';
    if let Some(bad) = handle.chars().find(|c| !valid(*c)) {
        return Err(AuthError::InvalidHandle {
            reason: format!("character {bad:?} is not allowed"),
        });
    }

    Ok(())
}
