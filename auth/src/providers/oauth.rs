//! OAuth2/OIDC provider trait.

use crate::error::Result;
use crate::state::ProfileInfo;
use super::TokenBundle;

/// OAuth2/OIDC provider.
///
/// One implementation per identity provider (Google, mock, ...). Providers
/// are collected by name in a [`ProviderRegistry`](super::ProviderRegistry).
///
/// # Implementation Notes
///
/// - Calls are made once; retries are the caller's decision
/// - Every network call must honour the timeout the provider was built with
pub trait OAuth2Provider: Send + Sync {
    /// Build the consent-screen URL.
    ///
    /// `state` is echoed back by the provider on the callback and must be
    /// included verbatim.
    ///
    /// # Errors
    ///
    /// Returns error if URL construction fails.
    fn build_authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String>;

    /// Exchange an authorization code for a token bundle.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExchange` if:
    /// - Network request fails
    /// - Provider rejects the code
    /// - Response is malformed
    fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> impl std::future::Future<Output = Result<TokenBundle>> + Send;

    /// Fetch name and email from the identity endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExchange` if:
    /// - Network request fails
    /// - Token is invalid
    /// - Response is malformed
    fn fetch_profile(
        &self,
        access_token: &str,
    ) -> impl std::future::Future<Output = Result<ProfileInfo>> + Send;
}
