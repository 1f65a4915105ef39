//! Provider lookup by name.

use crate::error::{AuthError, Result};
use crate::state::ProfileInfo;
use super::{OAuth2Provider, TokenBundle};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Map of provider name → provider client.
///
/// Built once at startup, so a provider whose configuration cannot be
/// loaded is detected before the first request instead of on it.
///
/// # Example
///
/// ```no_run
/// use keyward_auth::providers::{GoogleOAuthProvider, ProviderRegistry};
/// use std::time::Duration;
///
/// # fn example() -> keyward_auth::Result<()> {
/// let google = GoogleOAuthProvider::from_client_secrets(
///     "/usr/local/etc/google_secret.json",
///     Duration::from_secs(10),
/// )?;
/// let registry = ProviderRegistry::new().with_provider("google", google);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProviderRegistry<P> {
    providers: HashMap<String, P>,
}

impl<P> Default for ProviderRegistry<P> {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }
}

impl<P: OAuth2Provider> ProviderRegistry<P> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`.
    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, provider: P) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Look up a provider.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedProvider` if no provider has that name.
    pub fn get(&self, name: &str) -> Result<&P> {
        self.providers
            .get(name)
            .ok_or_else(|| AuthError::UnsupportedProvider {
                provider: name.to_string(),
            })
    }

    /// `true` if a provider is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Consent URL for `provider`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedProvider` for unknown providers.
    pub fn build_authorization_url(
        &self,
        provider: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        self.get(provider)?.build_authorization_url(state, redirect_uri)
    }

    /// Exchange `code` and, if the access token is still valid at `now`,
    /// fetch the user's profile.
    ///
    /// The profile is `None` when the provider handed back an already
    /// expired token; the caller then cannot log the session in.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `provider` is unknown → `AuthError::UnsupportedProvider`
    /// - either provider call fails → `AuthError::TokenExchange`
    pub async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<(TokenBundle, Option<ProfileInfo>)> {
        let client = self.get(provider)?;
        let bundle = client.exchange_code(code, redirect_uri).await?;

        if bundle.is_access_token_expired(now) {
            tracing::warn!(provider, "Provider returned an expired access token");
            return Ok((bundle, None));
        }

        let profile = client.fetch_profile(&bundle.access_token).await?;
        Ok((bundle, Some(profile)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockOAuth2Provider;
    use chrono::Duration;

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let registry = ProviderRegistry::new().with_provider("google", MockOAuth2Provider::new());

        let result = registry.build_authorization_url("github", "s", "http://localhost/oauth/github");
        assert!(matches!(
            result,
            Err(AuthError::UnsupportedProvider { provider }) if provider == "github"
        ));
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = ProviderRegistry::new()
            .with_provider("google", MockOAuth2Provider::new())
            .with_provider("example", MockOAuth2Provider::new());
        assert_eq!(registry.names(), vec!["example", "google"]);
    }

    #[tokio::test]
    async fn test_exchange_returns_profile() {
        let registry = ProviderRegistry::new()
            .with_provider("google", MockOAuth2Provider::new().with_email("a@x.com"));

        let (bundle, profile) = registry
            .exchange_code("google", "code", "http://localhost/oauth/google", Utc::now())
            .await
            .unwrap();

        assert_eq!(profile.unwrap().email, "a@x.com");
        assert!(bundle.expires_at().is_some());
    }

    #[tokio::test]
    async fn test_expired_access_token_skips_profile() {
        let provider = MockOAuth2Provider::new().with_token_lifetime(Duration::seconds(-5));
        let registry = ProviderRegistry::new().with_provider("google", provider.clone());

        let (_, profile) = registry
            .exchange_code("google", "code", "http://localhost/oauth/google", Utc::now())
            .await
            .unwrap();

        assert!(profile.is_none());
        assert_eq!(provider.profile_calls(), 0);
    }

    #[tokio::test]
    async fn test_exchange_failure_is_surfaced() {
        let registry = ProviderRegistry::new().with_provider("google", MockOAuth2Provider::failing());

        let result = registry
            .exchange_code("google", "code", "http://localhost/oauth/google", Utc::now())
            .await;

        assert!(matches!(result, Err(AuthError::TokenExchange(_))));
    }
}
