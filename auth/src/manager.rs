//! Authentication session manager.
//!
//! Drives one client's session through the login state machine:
//!
//! ```text
//! Anonymous ──step 1──▶ AwaitingProvider ──step 2──▶ Authenticated
//!                                                      │
//!                               ┌──── user found ──────┤
//!                               ▼                      ▼ handle chosen
//!                           LoggedIn ◀──register── PendingRegistration
//! ```
//!
//! Every operation addresses the session by its [`SessionToken`] and writes
//! the result back to the [`SessionStore`] before returning. Binding a user
//! to a session moves it to a freshly generated token; the old token stops
//! addressing anything.

use crate::config::AuthConfig;
use crate::environment::{AuthEnvironment, Clock, SystemClock};
use crate::error::{AuthError, Result, UniqueField};
use crate::providers::{
    MAX_HANDLE_NUMBER, OAuth2Provider, SessionStore, User, UserRepository,
};
use crate::state::{
    ApiKey, LoginRedirect, OAuthFlow, RedirectTarget, Registration, Session, SessionToken,
};
use crate::utils::{generate_csrf_state, validate_handle};
use chrono::{DateTime, Utc};
use rand::Rng;

/// Number of distinct `(handle, number)` slots per handle.
const HANDLE_SLOTS: u16 = MAX_HANDLE_NUMBER + 1;

/// Authentication session manager.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
#[derive(Debug, Clone)]
pub struct AuthManager<O, U, S, C = SystemClock>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
    C: Clock,
{
    env: AuthEnvironment<O, U, S, C>,
    config: AuthConfig,
}

impl<O, U, S, C> AuthManager<O, U, S, C>
where
    O: OAuth2Provider,
    U: UserRepository,
    S: SessionStore,
    C: Clock,
{
    /// Create a new manager.
    #[must_use]
    pub const fn new(env: AuthEnvironment<O, U, S, C>, config: AuthConfig) -> Self {
        Self { env, config }
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Injected collaborators.
    #[must_use]
    pub const fn environment(&self) -> &AuthEnvironment<O, U, S, C> {
        &self.env
    }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    /// `true` iff the session's credential expiry lies in the future.
    #[must_use]
    pub fn is_logged_in(&self, session: &Session) -> bool {
        session.is_logged_in(self.now())
    }

    /// Load a session, starting an empty one if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns error if the session store fails.
    pub async fn load_session(&self, token: &SessionToken) -> Result<Session> {
        Ok(self.env.sessions.load(token).await?.unwrap_or_default())
    }

    /// Step 1 of the login handshake.
    ///
    /// Records the chosen provider, the return URL and a fresh CSRF `state`
    /// in the session and returns the provider's consent URL.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `provider` is not configured → `AuthError::UnsupportedProvider`
    /// - The session store fails
    pub async fn login_step1(
        &self,
        token: &SessionToken,
        provider: &str,
        return_url: &str,
    ) -> Result<RedirectTarget> {
        self.begin(token, provider, return_url, OAuthFlow::Login).await
    }

    /// Step 1 of a handshake that ends in registration rather than login.
    ///
    /// Identical to [`login_step1`](Self::login_step1) except that the
    /// provider calls back to the registration route.
    ///
    /// # Errors
    ///
    /// Same as [`login_step1`](Self::login_step1).
    pub async fn registration_step1(
        &self,
        token: &SessionToken,
        provider: &str,
        return_url: &str,
    ) -> Result<RedirectTarget> {
        self.begin(token, provider, return_url, OAuthFlow::Register).await
    }

    async fn begin(
        &self,
        token: &SessionToken,
        provider: &str,
        return_url: &str,
        flow: OAuthFlow,
    ) -> Result<RedirectTarget> {
        let redirect_uri = self.config.callback_uri(provider, flow);
        let state = generate_csrf_state();
        let url = self
            .env
            .providers
            .build_authorization_url(provider, &state, &redirect_uri)?;

        let mut session = self.load_session(token).await?;
        session.auth.service = Some(provider.to_string());
        session.auth.return_to = Some(return_url.to_string());
        session.auth.oauth_state = Some(state);
        self.env.sessions.save(token, &session).await?;

        tracing::debug!(provider, ?flow, "OAuth handshake started");
        Ok(RedirectTarget(url))
    }

    /// Step 2 of the login handshake.
    ///
    /// Checks `state` against the value issued at step 1 (single use),
    /// exchanges `code`, then records credentials, identity and expiry in
    /// the session. A new identity replaces any user previously bound. With
    /// `do_login`, the user is looked up by email: on a hit their
    /// credentials and name are refreshed and the session is bound to them
    /// under a new token; on a miss the session is flushed.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Step 1 was not run for this session → `AuthError::OAuthStateMissing`
    /// - `state` differs from the issued one → `AuthError::OAuthStateInvalid`
    /// - The provider fails → `AuthError::TokenExchange`
    /// - `do_login` and no user has the email → `AuthError::UserNotRegistered`
    /// - A store fails
    pub async fn login_step2(
        &self,
        token: &SessionToken,
        code: &str,
        state: &str,
        return_url: &str,
        do_login: bool,
    ) -> Result<LoginRedirect> {
        let mut session = self.load_session(token).await?;
        let service = session
            .auth
            .service
            .clone()
            .ok_or(AuthError::OAuthStateMissing)?;

        let expected = session
            .auth
            .oauth_state
            .take()
            .ok_or(AuthError::OAuthStateMissing)?;
        if expected != state {
            self.env.sessions.save(token, &session).await?;
            tracing::warn!(provider = %service, "OAuth state mismatch");
            return Err(AuthError::OAuthStateInvalid);
        }

        let flow = if do_login {
            OAuthFlow::Login
        } else {
            OAuthFlow::Register
        };
        let redirect_uri = self.config.callback_uri(&service, flow);

        let (bundle, profile) = self
            .env
            .providers
            .exchange_code(&service, code, &redirect_uri, self.now())
            .await
            .inspect_err(|e| tracing::warn!(provider = %service, error = %e, "Code exchange failed"))?;

        session.creds = Some(bundle.raw.clone());

        let Some(profile) = profile else {
            self.env.sessions.save(token, &session).await?;
            return Ok(LoginRedirect {
                target: RedirectTarget(return_url.to_string()),
                token: token.clone(),
            });
        };

        session.auth.expires = bundle.expires_at();
        session.auth.api_key = None;
        session.info = Some(profile.clone());

        if do_login {
            let Some(mut user) = self.env.users.get_user_by_email(&profile.email).await? else {
                self.env.sessions.flush(token).await?;
                tracing::info!(provider = %service, "Login by unregistered identity");
                return Err(AuthError::UserNotRegistered);
            };

            user.auth_data = bundle.raw.to_string();
            user.name = profile.name;
            self.env.users.update_user(&user).await?;

            session.auth.api_key = Some(user.api_key);
            let token = self.rotate(token, &session).await?;
            tracing::info!(
                provider = %service,
                user = %user.display_handle(),
                "User logged in"
            );
            return Ok(LoginRedirect {
                target: RedirectTarget(return_url.to_string()),
                token,
            });
        }

        self.env.sessions.save(token, &session).await?;
        Ok(LoginRedirect {
            target: RedirectTarget(return_url.to_string()),
            token: token.clone(),
        })
    }

    /// Store the handle the client wants to register under.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The handle is malformed → `AuthError::InvalidHandle`
    /// - The session store fails
    pub async fn set_handle(&self, token: &SessionToken, handle: &str) -> Result<()> {
        validate_handle(handle)?;

        let mut session = self.load_session(token).await?;
        session.handle = Some(handle.to_string());
        self.env.sessions.save(token, &session).await
    }

    /// Create a user from the identity and handle held in the session.
    ///
    /// Returns `Ok(None)` if the session lacks any of handle, provider,
    /// identity or credentials. The new user is not bound to the session;
    /// call [`bind_user`](Self::bind_user) for that.
    ///
    /// A fresh API key is drawn for each attempt. The handle number is
    /// tried from a random start, wrapping modulo 10000, until a free slot
    /// is found. Collisions reported by the store at insert time (another
    /// registration won the race) are retried.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - All 10000 numbers of the handle are taken, or every drawn API key
    ///   collided → `AuthError::RegistrationExhausted`
    /// - The email is already registered → `AuthError::Conflict`
    /// - The handle is malformed → `AuthError::InvalidHandle`
    /// - A store fails
    pub async fn register_user(&self, token: &SessionToken) -> Result<Option<User>> {
        let session = self.load_session(token).await?;
        let Some(registration) = session.registration() else {
            tracing::debug!(phase = ?session.phase(self.now()), "Registration preconditions missing");
            return Ok(None);
        };
        validate_handle(&registration.handle)?;

        for _ in 0..self.config.max_key_attempts.get() {
            let api_key = ApiKey::generate();
            if self.env.users.get_user_by_api_key(api_key).await?.is_some() {
                tracing::debug!("Generated API key already taken");
                continue;
            }

            match self.claim_handle(&registration, api_key).await? {
                Claim::Created(user) => {
                    tracing::info!(
                        user = %user.display_handle(),
                        service = %user.service,
                        "User registered"
                    );
                    return Ok(Some(user));
                }
                Claim::KeyTaken => {}
                Claim::NamespaceFull => {
                    tracing::warn!(handle = %registration.handle, "Handle namespace exhausted");
                    return Err(AuthError::RegistrationExhausted {
                        handle: registration.handle,
                    });
                }
            }
        }

        tracing::warn!(
            attempts = self.config.max_key_attempts,
            "No unique API key after retry cap"
        );
        Err(AuthError::RegistrationExhausted {
            handle: registration.handle,
        })
    }

    async fn claim_handle(&self, registration: &Registration, api_key: ApiKey) -> Result<Claim> {
        let start = rand::thread_rng().gen_range(0..HANDLE_SLOTS);

        for offset in 0..HANDLE_SLOTS {
            let number = (start + offset) % HANDLE_SLOTS;
            if self
                .env
                .users
                .get_user_by_handle(&registration.handle, number)
                .await?
                .is_some()
            {
                continue;
            }

            let user = User {
                name: registration.name.clone(),
                email: registration.email.clone(),
                api_key,
                handle: registration.handle.clone(),
                number,
                service: registration.service.clone(),
                auth_data: registration.creds.to_string(),
                active: true,
            };

            match self.env.users.insert_user(&user).await {
                Ok(()) => return Ok(Claim::Created(user)),
                Err(AuthError::Conflict(UniqueField::Handle)) => {
                    tracing::debug!(number, "Lost race for handle number");
                }
                Err(AuthError::Conflict(UniqueField::ApiKey)) => return Ok(Claim::KeyTaken),
                Err(e) => return Err(e),
            }
        }

        Ok(Claim::NamespaceFull)
    }

    /// Bind `user` to the session, completing login.
    ///
    /// Returns the token the session now lives under; `token` no longer
    /// addresses it.
    ///
    /// # Errors
    ///
    /// Returns error if the session store fails.
    pub async fn bind_user(&self, token: &SessionToken, user: &User) -> Result<SessionToken> {
        let mut session = self.load_session(token).await?;
        session.auth.api_key = Some(user.api_key);
        session.handle = None;
        self.rotate(token, &session).await
    }

    /// Store `session` under a new token and discard the old one.
    async fn rotate(&self, old: &SessionToken, session: &Session) -> Result<SessionToken> {
        let token = SessionToken::generate();
        self.env.sessions.save(&token, session).await?;
        self.env.sessions.flush(old).await?;
        tracing::debug!("Session token rotated");
        Ok(token)
    }

    /// User bound to `session`, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the user store fails.
    pub async fn current_user(&self, session: &Session) -> Result<Option<User>> {
        match session.auth.api_key {
            Some(api_key) => self.env.users.get_user_by_api_key(api_key).await,
            None => Ok(None),
        }
    }

    /// Look a user up by email.
    ///
    /// # Errors
    ///
    /// Returns error if the user store fails.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.env.users.get_user_by_email(email).await
    }

    /// Discard the session.
    ///
    /// # Errors
    ///
    /// Returns error if the session store fails.
    pub async fn logout(&self, token: &SessionToken) -> Result<()> {
        self.env.sessions.flush(token).await
    }
}

enum Claim {
    Created(User),
    KeyTaken,
    NamespaceFull,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{
        FixedClock, MockOAuth2Provider, MockSessionStore, MockUserRepository, test_clock,
    };
    use crate::providers::ProviderRegistry;
    use crate::state::LoginPhase;
    use chrono::Duration;
    use std::num::NonZeroU32;

    type TestManager =
        AuthManager<MockOAuth2Provider, MockUserRepository, MockSessionStore, FixedClock>;

    fn manager_with(provider: MockOAuth2Provider) -> (TestManager, MockUserRepository, MockSessionStore) {
        let users = MockUserRepository::new();
        let sessions = MockSessionStore::new();
        let env = AuthEnvironment::new(
            ProviderRegistry::new().with_provider("google", provider),
            users.clone(),
            sessions.clone(),
        )
        .with_clock(test_clock());
        (
            AuthManager::new(env, AuthConfig::new("https://keyward.test")),
            users,
            sessions,
        )
    }

    /// CSRF state step 1 stored for `token`.
    fn issued_state(sessions: &MockSessionStore, token: &SessionToken) -> String {
        sessions
            .snapshot(token)
            .unwrap()
            .unwrap()
            .auth
            .oauth_state
            .unwrap()
    }

    fn provider_valid_for(clock_offset: Duration) -> MockOAuth2Provider {
        MockOAuth2Provider::new()
            .with_email("a@x.com")
            .with_name("Alice")
            .with_expires_at(test_clock().now() + clock_offset)
    }

    #[tokio::test]
    async fn test_step2_without_step1_is_rejected() {
        let (manager, _, _) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();

        let result = manager.login_step2(&token, "code", "state", "/", true).await;
        assert!(matches!(result, Err(AuthError::OAuthStateMissing)));
    }

    #[tokio::test]
    async fn test_step1_unknown_provider_leaves_session_untouched() {
        let (manager, _, sessions) = manager_with(MockOAuth2Provider::new());
        let token = SessionToken::generate();

        let result = manager.login_step1(&token, "github", "/").await;
        assert!(matches!(result, Err(AuthError::UnsupportedProvider { .. })));
        assert_eq!(sessions.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_registration_flow_keeps_identity() {
        let (manager, users, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();

        manager.registration_step1(&token, "google", "/home").await.unwrap();
        let state = issued_state(&sessions, &token);
        let outcome = manager
            .login_step2(&token, "code", &state, "/register", false)
            .await
            .unwrap();
        assert_eq!(outcome.target.as_str(), "/register");
        assert_eq!(outcome.token, token);

        let session = sessions.snapshot(&token).unwrap().unwrap();
        assert!(manager.is_logged_in(&session));
        assert_eq!(session.info.unwrap().email, "a@x.com");
        assert!(session.auth.api_key.is_none());
        assert_eq!(users.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_records_creds_only() {
        let (manager, _, sessions) = manager_with(provider_valid_for(Duration::seconds(-1)));
        let token = SessionToken::generate();

        manager.login_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", true).await.unwrap();

        let session = sessions.snapshot(&token).unwrap().unwrap();
        assert!(session.creds.is_some());
        assert!(session.info.is_none());
        assert!(!manager.is_logged_in(&session));
    }

    #[tokio::test]
    async fn test_login_refreshes_known_user() {
        let (manager, users, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let existing = User {
            name: "Old Name".to_string(),
            email: "a@x.com".to_string(),
            api_key: ApiKey::generate(),
            handle: "alice".to_string(),
            number: 7,
            service: "google".to_string(),
            auth_data: "{}".to_string(),
            active: true,
        };
        users.seed(existing.clone()).unwrap();
        let token = SessionToken::generate();

        manager.login_step1(&token, "google", "/dashboard").await.unwrap();
        let state = issued_state(&sessions, &token);
        let outcome = manager
            .login_step2(&token, "code", &state, "/dashboard", true)
            .await
            .unwrap();
        assert_eq!(outcome.target.as_str(), "/dashboard");

        // Binding moved the session to a new token
        assert_ne!(outcome.token, token);
        assert!(sessions.snapshot(&token).unwrap().is_none());
        let session = sessions.snapshot(&outcome.token).unwrap().unwrap();
        assert_eq!(session.auth.api_key, Some(existing.api_key));
        assert!(session.auth.oauth_state.is_none());

        let refreshed = users.get_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(refreshed.name, "Alice");
        assert_ne!(refreshed.auth_data, "{}");
        assert_eq!(manager.current_user(&session).await.unwrap(), Some(refreshed));
    }

    #[tokio::test]
    async fn test_session_expires_with_clock() {
        let provider = provider_valid_for(Duration::minutes(10));
        let (manager, _, sessions) = manager_with(provider);
        let clock = manager.environment().clock.clone();
        let token = SessionToken::generate();

        manager.registration_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", false).await.unwrap();
        let session = sessions.snapshot(&token).unwrap().unwrap();
        assert!(manager.is_logged_in(&session));

        clock.advance(Duration::minutes(10));
        assert!(!manager.is_logged_in(&session));
    }

    #[tokio::test]
    async fn test_register_without_handle_returns_none() {
        let (manager, users, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();

        manager.registration_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", false).await.unwrap();

        assert_eq!(manager.register_user(&token).await.unwrap(), None);
        assert_eq!(users.user_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_handle_rejects_invalid() {
        let (manager, _, _) = manager_with(MockOAuth2Provider::new());
        let token = SessionToken::generate();

        let result = manager.set_handle(&token, "no spaces allowed").await;
        assert!(matches!(result, Err(AuthError::InvalidHandle { .. })));
    }

    #[tokio::test]
    async fn test_register_retries_on_key_conflict() {
        let (manager, users, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();

        manager.registration_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", false).await.unwrap();
        manager.set_handle(&token, "alice").await.unwrap();

        users
            .force_conflicts([UniqueField::ApiKey, UniqueField::Handle])
            .unwrap();
        let user = manager.register_user(&token).await.unwrap().unwrap();

        assert_eq!(user.handle, "alice");
        assert_eq!(users.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_gives_up_after_key_cap() {
        let (manager, users, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();

        manager.registration_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", false).await.unwrap();
        manager.set_handle(&token, "alice").await.unwrap();

        let cap = manager.config().max_key_attempts.get() as usize;
        users
            .force_conflicts(std::iter::repeat_n(UniqueField::ApiKey, cap))
            .unwrap();

        let result = manager.register_user(&token).await;
        assert!(matches!(result, Err(AuthError::RegistrationExhausted { .. })));
        assert_eq!(users.user_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_logout_flushes_session() {
        let (manager, _, sessions) = manager_with(MockOAuth2Provider::new());
        let token = SessionToken::generate();

        manager.login_step1(&token, "google", "/").await.unwrap();
        assert_eq!(sessions.session_count().unwrap(), 1);

        manager.logout(&token).await.unwrap();
        assert_eq!(sessions.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_step2_rejects_foreign_state_once() {
        let (manager, _, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();

        manager.login_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);

        let result = manager.login_step2(&token, "code", "forged", "/", true).await;
        assert!(matches!(result, Err(AuthError::OAuthStateInvalid)));

        // The issued state is spent; replaying it needs a new step 1
        let result = manager.login_step2(&token, "code", &state, "/", true).await;
        assert!(matches!(result, Err(AuthError::OAuthStateMissing)));
        assert_eq!(manager.environment().providers.get("google").unwrap().exchange_calls(), 0);
    }

    #[tokio::test]
    async fn test_new_identity_drops_previous_binding() {
        let (manager, _, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();
        let mut session = Session::default();
        session.auth.api_key = Some(ApiKey::generate());
        sessions.save(&token, &session).await.unwrap();

        manager.registration_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", false).await.unwrap();

        let session = sessions.snapshot(&token).unwrap().unwrap();
        assert!(session.auth.api_key.is_none());
        assert_eq!(session.phase(manager.now()), LoginPhase::Authenticated);
    }

    #[tokio::test]
    async fn test_bind_user_rotates_token() {
        let (manager, users, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let token = SessionToken::generate();

        manager.registration_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", false).await.unwrap();
        manager.set_handle(&token, "alice").await.unwrap();
        let user = manager.register_user(&token).await.unwrap().unwrap();

        let bound = manager.bind_user(&token, &user).await.unwrap();

        assert_ne!(bound, token);
        assert!(sessions.snapshot(&token).unwrap().is_none());
        let session = sessions.snapshot(&bound).unwrap().unwrap();
        assert_eq!(session.phase(manager.now()), LoginPhase::LoggedIn);
        assert_eq!(users.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_single_key_attempt_registers_on_empty_store() {
        let (manager, users, sessions) = manager_with(provider_valid_for(Duration::hours(1)));
        let manager = AuthManager::new(
            manager.environment().clone(),
            manager.config().clone().with_max_key_attempts(NonZeroU32::MIN),
        );
        let token = SessionToken::generate();

        manager.registration_step1(&token, "google", "/").await.unwrap();
        let state = issued_state(&sessions, &token);
        manager.login_step2(&token, "code", &state, "/", false).await.unwrap();
        manager.set_handle(&token, "zed").await.unwrap();

        let user = manager.register_user(&token).await.unwrap().unwrap();
        assert_eq!(user.handle, "zed");
        assert_eq!(users.user_count().unwrap(), 1);
    }
}
