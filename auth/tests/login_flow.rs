//! End-to-end tests of the login and registration handshake.
//!
//! Runs the manager against the in-memory mocks: an unregistered identity
//! is refused and its session cleared, registers under a handle, then logs
//! in again with the same identity.

use chrono::Duration;
use keyward_auth::mocks::{
    FixedClock, MockOAuth2Provider, MockSessionStore, MockUserRepository, consent_state,
    test_clock,
};
use keyward_auth::providers::ProviderRegistry;
use keyward_auth::{
    AuthConfig, AuthEnvironment, AuthError, AuthManager, Clock, LoginPhase, SessionToken,
};

type TestManager =
    AuthManager<MockOAuth2Provider, MockUserRepository, MockSessionStore, FixedClock>;

struct Harness {
    manager: TestManager,
    provider: MockOAuth2Provider,
    users: MockUserRepository,
    sessions: MockSessionStore,
}

fn harness() -> Harness {
    let provider = MockOAuth2Provider::new()
        .with_email("a@x.com")
        .with_name("Alice")
        .with_expires_at(test_clock().now() + Duration::hours(1));
    let users = MockUserRepository::new();
    let sessions = MockSessionStore::new();

    let env = AuthEnvironment::new(
        ProviderRegistry::new().with_provider("google", provider.clone()),
        users.clone(),
        sessions.clone(),
    )
    .with_clock(test_clock());

    Harness {
        manager: AuthManager::new(env, AuthConfig::new("https://keyward.test")),
        provider,
        users,
        sessions,
    }
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_step1_records_provider_and_redirect_uri() {
    let h = harness();
    let token = SessionToken::generate();

    let consent = h.manager.login_step1(&token, "google", "/next").await.unwrap();
    let state = consent_state(consent.as_str()).unwrap();

    assert!(
        consent
            .as_str()
            .contains("redirect_uri=https%3A%2F%2Fkeyward.test%2Foauth%2Fgoogle"),
        "consent URL was {}",
        consent.as_str()
    );

    let session = h.sessions.snapshot(&token).unwrap().unwrap();
    assert_eq!(session.auth.service.as_deref(), Some("google"));
    assert_eq!(session.auth.return_to.as_deref(), Some("/next"));
    assert_eq!(session.auth.oauth_state, Some(state));
    assert_eq!(session.phase(h.manager.now()), LoginPhase::AwaitingProvider);
    assert_eq!(h.provider.exchange_calls(), 0);
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_unregistered_identity_then_registration() {
    let h = harness();

    // Login by an unknown email clears the session
    let token = SessionToken::generate();
    let consent = h.manager.login_step1(&token, "google", "/").await.unwrap();
    let state = consent_state(consent.as_str()).unwrap();
    let result = h.manager.login_step2(&token, "code-1", &state, "/", true).await;

    assert!(matches!(result, Err(AuthError::UserNotRegistered)));
    assert!(h.sessions.snapshot(&token).unwrap().is_none());
    assert_eq!(h.users.user_count().unwrap(), 0);

    // Registration round trip on a fresh session
    let token = SessionToken::generate();
    let consent = h.manager
        .registration_step1(&token, "google", "/welcome")
        .await
        .unwrap();
    let state = consent_state(consent.as_str()).unwrap();
    h.manager
        .login_step2(&token, "code-2", &state, "/register", false)
        .await
        .unwrap();
    h.manager.set_handle(&token, "alice").await.unwrap();

    let session = h.manager.load_session(&token).await.unwrap();
    assert_eq!(session.phase(h.manager.now()), LoginPhase::PendingRegistration);

    let user = h.manager.register_user(&token).await.unwrap().unwrap();
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.name, "Alice");
    assert_eq!(user.handle, "alice");
    assert!(user.number <= 9999);
    assert_eq!(user.service, "google");
    assert!(user.active);
    assert!(user.auth_data.contains("mock_access_token_code-2"));

    let stored = h.manager.get_user_by_email("a@x.com").await.unwrap();
    assert_eq!(stored, Some(user.clone()));

    let bound = h.manager.bind_user(&token, &user).await.unwrap();
    assert!(h.sessions.snapshot(&token).unwrap().is_none());
    let session = h.sessions.snapshot(&bound).unwrap().unwrap();
    assert_eq!(session.phase(h.manager.now()), LoginPhase::LoggedIn);
    assert!(session.handle.is_none());
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_registered_user_logs_in_on_a_new_session() {
    let h = harness();

    let token = SessionToken::generate();
    let consent = h.manager.registration_step1(&token, "google", "/").await.unwrap();
    let state = consent_state(consent.as_str()).unwrap();
    h.manager
        .login_step2(&token, "code", &state, "/register", false)
        .await
        .unwrap();
    h.manager.set_handle(&token, "alice").await.unwrap();
    let user = h.manager.register_user(&token).await.unwrap().unwrap();
    h.manager.logout(&token).await.unwrap();

    let token = SessionToken::generate();
    let consent = h.manager.login_step1(&token, "google", "/dashboard").await.unwrap();
    let state = consent_state(consent.as_str()).unwrap();
    let outcome = h
        .manager
        .login_step2(&token, "code", &state, "/dashboard", true)
        .await
        .unwrap();

    assert_eq!(outcome.target.as_str(), "/dashboard");
    assert!(h.sessions.snapshot(&token).unwrap().is_none());
    let session = h.sessions.snapshot(&outcome.token).unwrap().unwrap();
    assert_eq!(session.auth.api_key, Some(user.api_key));
    assert!(h.manager.is_logged_in(&session));
    assert_eq!(h.provider.exchange_calls(), 2);
    assert_eq!(h.users.user_count().unwrap(), 1);
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_provider_failure_keeps_session() {
    let users = MockUserRepository::new();
    let sessions = MockSessionStore::new();
    let env = AuthEnvironment::new(
        ProviderRegistry::new().with_provider("google", MockOAuth2Provider::failing()),
        users,
        sessions.clone(),
    )
    .with_clock(test_clock());
    let manager = AuthManager::new(env, AuthConfig::new("https://keyward.test"));
    let token = SessionToken::generate();

    let consent = manager.login_step1(&token, "google", "/").await.unwrap();
    let state = consent_state(consent.as_str()).unwrap();
    let result = manager.login_step2(&token, "bad", &state, "/", true).await;

    assert!(matches!(result, Err(AuthError::TokenExchange(_))));
    let session = sessions.snapshot(&token).unwrap().unwrap();
    assert_eq!(session.auth.service.as_deref(), Some("google"));
    assert!(session.creds.is_none());
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_callback_with_state_from_another_session_is_refused() {
    let h = harness();

    let victim = SessionToken::generate();
    h.manager.login_step1(&victim, "google", "/").await.unwrap();

    let attacker = SessionToken::generate();
    let consent = h.manager.login_step1(&attacker, "google", "/").await.unwrap();
    let attacker_state = consent_state(consent.as_str()).unwrap();

    let result = h
        .manager
        .login_step2(&victim, "attacker-code", &attacker_state, "/", true)
        .await;

    assert!(matches!(result, Err(AuthError::OAuthStateInvalid)));
    assert_eq!(h.provider.exchange_calls(), 0);
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_unsupported_provider() {
    let h = harness();
    let token = SessionToken::generate();

    let result = h.manager.registration_step1(&token, "myspace", "/").await;

    assert!(matches!(
        result,
        Err(AuthError::UnsupportedProvider { ref provider }) if provider == "myspace"
    ));
}
