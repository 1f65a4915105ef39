//! Authentication configuration.
//!
//! Values are supplied by the application at startup; nothing here reads
//! the process environment.

use crate::state::OAuthFlow;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the OAuth client-secret document.
pub const DEFAULT_OAUTH_PATH: &str = "/usr/local/etc/google_secret.json";

/// Default API-key retry cap.
pub const DEFAULT_MAX_KEY_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(8) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// Login and registration configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Public base URL of the service (e.g., "https://app.example.com").
    ///
    /// OAuth redirect URIs are formatted as `{base_url}/oauth/{provider}`.
    pub base_url: String,

    /// Path to the provider client-secret document.
    ///
    /// Default: `/usr/local/etc/google_secret.json`
    pub oauth_path: PathBuf,

    /// Timeout for every call to a provider endpoint.
    ///
    /// Default: 10 seconds
    pub http_timeout: Duration,

    /// Lifetime of a server-side session entry, refreshed on each write.
    ///
    /// Default: 24 hours
    pub session_ttl: Duration,

    /// Name of the cookie carrying the session token.
    ///
    /// Default: `sessionid`
    pub session_cookie: String,

    /// Login page; login handshakes start at `{login_path}/{provider}`.
    /// Guards send browsers without a live session here.
    ///
    /// Default: `/login`
    pub login_path: String,

    /// Registration page; the registration handshake runs at
    /// `{register_path}/{provider}`. Unregistered identities are sent here
    /// after step 2.
    ///
    /// Default: `/register`
    pub register_path: String,

    /// Upper bound on fresh API keys drawn during one registration.
    ///
    /// Default: 8
    pub max_key_attempts: NonZeroU32,
}

impl AuthConfig {
    /// Create new configuration.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL for your application (e.g., "https://app.example.com")
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the client-secret document path.
    #[must_use]
    pub fn with_oauth_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.oauth_path = path.into();
        self
    }

    /// Set the provider call timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set session time-to-live.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the session cookie name.
    #[must_use]
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Set the login page path. Stored with one leading `/` and no
    /// trailing `/`.
    #[must_use]
    pub fn with_login_path(mut self, path: impl AsRef<str>) -> Self {
        self.login_path = route_path(path.as_ref());
        self
    }

    /// Set the registration page path. Stored with one leading `/` and no
    /// trailing `/`.
    #[must_use]
    pub fn with_register_path(mut self, path: impl AsRef<str>) -> Self {
        self.register_path = route_path(path.as_ref());
        self
    }

    /// Set the API-key retry cap.
    #[must_use]
    pub const fn with_max_key_attempts(mut self, attempts: NonZeroU32) -> Self {
        self.max_key_attempts = attempts;
        self
    }

    /// Redirect URI registered with `provider` for the login callback.
    #[must_use]
    pub fn redirect_uri(&self, provider: &str) -> String {
        self.callback_uri(provider, OAuthFlow::Login)
    }

    /// Redirect URI for `flow`. The same URI must be presented at both
    /// steps of one handshake.
    #[must_use]
    pub fn callback_uri(&self, provider: &str, flow: OAuthFlow) -> String {
        let base = self.base_url.trim_end_matches('/');
        match flow {
            OAuthFlow::Login => format!("{base}/oauth/{provider}"),
            OAuthFlow::Register => format!("{base}{}/{provider}", self.register_path),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            oauth_path: PathBuf::from(DEFAULT_OAUTH_PATH),
            http_timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(24 * 60 * 60),
            session_cookie: "sessionid".to_string(),
            login_path: "/login".to_string(),
            register_path: "/register".to_string(),
            max_key_attempts: DEFAULT_MAX_KEY_ATTEMPTS,
        }
    }
}

fn route_path(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}
