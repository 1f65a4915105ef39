//! Google OAuth 2.0 provider implementation.

use crate::error::{AuthError, Result};
use crate::providers::{OAuth2Provider, TokenBundle};
use crate::state::ProfileInfo;
use crate::utils::decode_id_token_claims;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URI: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Google OAuth 2.0 provider.
///
/// Implements the `OAuth2Provider` trait for Google Identity Platform,
/// requesting the `userinfo.profile` and `userinfo.email` scopes.
///
/// # Configuration
///
/// Load the client-secret document downloaded from Google Cloud Console:
///
/// ```no_run
/// use keyward_auth::providers::GoogleOAuthProvider;
/// use std::time::Duration;
///
/// # fn example() -> keyward_auth::Result<()> {
/// let google = GoogleOAuthProvider::from_client_secrets(
///     "/usr/local/etc/google_secret.json",
///     Duration::from_secs(10),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct GoogleOAuthProvider {
    /// OAuth 2.0 client ID from Google Cloud Console.
    client_id: String,

    /// OAuth 2.0 client secret (keep confidential).
    client_secret: String,

    /// HTTP client for making requests.
    http_client: Client,

    /// Scopes to request.
    scopes: Vec<String>,

    /// Consent screen endpoint.
    auth_uri: String,

    /// Token endpoint.
    token_uri: String,

    /// Request refresh token for offline access.
    ///
    /// Default: true
    request_refresh_token: bool,

    /// Force consent screen even if user previously authorized.
    ///
    /// Default: false (only show consent on first authorization)
    force_consent: bool,
}

impl GoogleOAuthProvider {
    /// Create a new Google OAuth provider.
    ///
    /// The HTTP client has no timeout until [`with_timeout`](Self::with_timeout)
    /// is called.
    #[must_use]
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http_client: Client::new(),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
            ],
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            request_refresh_token: true,
            force_consent: false,
        }
    }

    /// Build a provider from a Google client-secret document.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedProvider` if the document cannot be
    /// read or parsed, or `AuthError::Configuration` if the HTTP client
    /// cannot be built.
    pub fn from_client_secrets(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let secrets = ClientSecrets::from_file(path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Unable to load Google client secrets");
            AuthError::UnsupportedProvider {
                provider: "google".to_string(),
            }
        })?;

        Self::from_secrets(secrets).with_timeout(timeout)
    }

    /// Build a provider from an already parsed client-secret document.
    #[must_use]
    pub fn from_secrets(secrets: ClientSecrets) -> Self {
        let entry = secrets.web;
        let mut provider = Self::new(entry.client_id, entry.client_secret);
        provider.auth_uri = entry.auth_uri;
        provider.token_uri = entry.token_uri;
        provider
    }

    /// Rebuild the HTTP client with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    /// Set custom scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Request refresh token for offline access.
    ///
    /// Default: true
    #[must_use]
    pub const fn with_refresh_token(mut self, request: bool) -> Self {
        self.request_refresh_token = request;
        self
    }

    /// Force consent screen on every authorization.
    ///
    /// Default: false (only show on first auth)
    #[must_use]
    pub const fn with_force_consent(mut self, force: bool) -> Self {
        self.force_consent = force;
        self
    }
}

impl OAuth2Provider for GoogleOAuthProvider {
    fn build_authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String> {
        let scope = self.scopes.join(" ");
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
        ];

        if self.request_refresh_token {
            params.push(("access_type", "offline"));
        }

        if self.force_consent {
            params.push(("prompt", "consent"));
        }

        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::InternalError(format!("Failed to build URL: {e}")))?;

        Ok(format!("{}?{query}", self.auth_uri))
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenBundle> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Google token exchange failed: {}", error_body);
            return Err(AuthError::TokenExchange(format!(
                "token endpoint returned {status}"
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        parse_token_response(raw, Utc::now())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo> {
        let response = self
            .http_client
            .get(USERINFO_URI)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Google UserInfo request failed: {}", error_body);
            return Err(AuthError::TokenExchange(format!(
                "userinfo endpoint returned {status}"
            )));
        }

        let google_user: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        Ok(google_user.into())
    }
}

/// Turn a token endpoint response into a [`TokenBundle`].
///
/// `now` anchors the relative `expires_in` field.
///
/// # Errors
///
/// Returns `AuthError::TokenExchange` if the response lacks an access token
/// or carries an ID token whose claims cannot be decoded.
pub fn parse_token_response(raw: serde_json::Value, now: DateTime<Utc>) -> Result<TokenBundle> {
    let google_response: GoogleTokenResponse = serde_json::from_value(raw.clone())
        .map_err(|e| AuthError::TokenExchange(format!("Malformed token response: {e}")))?;

    let access_expires_at = google_response
        .expires_in
        .map(|expires_in| now + chrono::Duration::seconds(i64::from(expires_in)));

    let id_token_expires_at = match google_response.id_token.as_deref() {
        Some(id_token) => {
            let claims = decode_id_token_claims(id_token)?;
            Some(
                DateTime::from_timestamp(claims.exp, 0)
                    .ok_or_else(|| AuthError::TokenExchange("ID token exp out of range".into()))?,
            )
        }
        None => None,
    };

    Ok(TokenBundle {
        raw,
        access_token: google_response.access_token,
        access_expires_at,
        id_token_expires_at,
    })
}

/// Google client-secret document (`client_secret_*.json`).
///
/// Both the `web` and `installed` application layouts are accepted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSecrets {
    /// Credentials block.
    #[serde(alias = "installed")]
    pub web: ClientSecretEntry,
}

/// Credentials block of a [`ClientSecrets`] document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSecretEntry {
    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Redirect URIs registered with Google.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Consent screen endpoint.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecrets {
    /// Read and parse a client-secret document.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Configuration(format!("{}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Parse a client-secret document.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the document is malformed.
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| AuthError::Configuration(format!("Invalid client secrets: {e}")))
    }
}

/// Google's token endpoint response format.
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    /// Access token for API requests.
    access_token: String,

    /// Token expiration in seconds (typically 3600 = 1 hour).
    expires_in: Option<u32>,

    /// ID token (JWT) containing user claims.
    id_token: Option<String>,
}

/// Google's `oauth2/v2/userinfo` response format.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    /// Full name.
    name: Option<String>,

    /// Email address.
    email: String,
}

impl From<GoogleUserInfo> for ProfileInfo {
    fn from(user: GoogleUserInfo) -> Self {
        Self {
            name: user.name.unwrap_or_else(|| user.email.clone()),
            email: user.email,
        }
    }
}
