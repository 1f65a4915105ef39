//! Mock OAuth2 provider for testing.

use crate::error::{AuthError, Result};
use crate::providers::{OAuth2Provider, TokenBundle};
use crate::state::ProfileInfo;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock `OAuth2` provider.
///
/// Returns a predefined identity for any code. Clones share call counters.
#[derive(Debug, Clone)]
pub struct MockOAuth2Provider {
    /// Whether to simulate success or failure.
    pub should_succeed: bool,

    /// Name returned by the identity endpoint.
    pub name: String,

    /// Email returned by the identity endpoint.
    pub email: String,

    /// Lifetime of issued tokens, counted from the wall clock.
    pub token_lifetime: Duration,

    /// Absolute expiry of issued tokens; overrides `token_lifetime`.
    pub expires_at: Option<DateTime<Utc>>,

    exchange_calls: Arc<AtomicUsize>,
    profile_calls: Arc<AtomicUsize>,
}

impl MockOAuth2Provider {
    /// Create a new mock `OAuth2` provider that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            should_succeed: true,
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            token_lifetime: Duration::hours(1),
            expires_at: None,
            exchange_calls: Arc::new(AtomicUsize::new(0)),
            profile_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that will fail requests.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            should_succeed: false,
            ..Self::new()
        }
    }

    /// Report `email` as the user's address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Report `name` as the user's display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Issue tokens valid for `lifetime` (negative for already expired).
    #[must_use]
    pub const fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Issue tokens that expire at `at`.
    #[must_use]
    pub const fn with_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Number of code exchanges performed.
    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    /// Number of identity lookups performed.
    #[must_use]
    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

/// `state` parameter of a consent URL, as a browser would carry it back to
/// the callback.
#[must_use]
pub fn consent_state(consent_url: &str) -> Option<String> {
    let (_, query) = consent_url.split_once('?')?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find_map(|(key, value)| (key == "state").then_some(value))
}

impl Default for MockOAuth2Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuth2Provider for MockOAuth2Provider {
    fn build_authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String> {
        let query = serde_urlencoded::to_string([
            ("response_type", "code"),
            ("client_id", "mock-client"),
            ("redirect_uri", redirect_uri),
            ("state", state),
        ])
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(format!("https://auth.example.com/authorize?{query}"))
    }

    fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> impl Future<Output = Result<TokenBundle>> + Send {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        let should_succeed = self.should_succeed;
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now() + self.token_lifetime);
        let access_token = format!("mock_access_token_{code}");

        async move {
            if !should_succeed {
                return Err(AuthError::TokenExchange("invalid_grant".to_string()));
            }

            Ok(TokenBundle {
                raw: serde_json::json!({
                    "access_token": access_token,
                    "token_type": "Bearer",
                    "expires_at": expires_at.timestamp(),
                }),
                access_token,
                access_expires_at: Some(expires_at),
                id_token_expires_at: Some(expires_at),
            })
        }
    }

    fn fetch_profile(&self, _access_token: &str) -> impl Future<Output = Result<ProfileInfo>> + Send {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let should_succeed = self.should_succeed;
        let profile = ProfileInfo {
            name: self.name.clone(),
            email: self.email.clone(),
        };

        async move {
            if !should_succeed {
                return Err(AuthError::TokenExchange("invalid token".to_string()));
            }
            Ok(profile)
        }
    }
}
