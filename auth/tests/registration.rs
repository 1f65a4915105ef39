//! Registration uniqueness under concurrency.
//!
//! Registrations run as parallel tasks against one shared user store whose
//! inserts enforce the unique columns. API keys and `(handle, number)` pairs
//! must come out pairwise distinct, and a full handle namespace must be
//! reported rather than looped on.

use chrono::Duration;
use keyward_auth::mocks::{
    FixedClock, MockOAuth2Provider, MockSessionStore, MockUserRepository, consent_state,
    test_clock,
};
use keyward_auth::providers::{MAX_HANDLE_NUMBER, ProviderRegistry};
use keyward_auth::{
    ApiKey, AuthConfig, AuthEnvironment, AuthError, AuthManager, Clock, SessionToken, User,
};
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;

type TestManager =
    AuthManager<MockOAuth2Provider, MockUserRepository, MockSessionStore, FixedClock>;

/// One provider per registrant, so every identity has its own email.
fn manager(registrants: usize) -> (Arc<TestManager>, MockUserRepository) {
    manager_with_config(registrants, AuthConfig::new("https://keyward.test"))
}

fn manager_with_config(
    registrants: usize,
    config: AuthConfig,
) -> (Arc<TestManager>, MockUserRepository) {
    let expires = test_clock().now() + Duration::hours(1);
    let providers = (0..registrants).fold(ProviderRegistry::new(), |registry, i| {
        registry.with_provider(
            format!("p{i}"),
            MockOAuth2Provider::new()
                .with_email(format!("user{i}@x.com"))
                .with_expires_at(expires),
        )
    });
    let users = MockUserRepository::new();

    let env = AuthEnvironment::new(providers, users.clone(), MockSessionStore::new())
        .with_clock(test_clock());
    let manager = AuthManager::new(env, config);
    (Arc::new(manager), users)
}

/// Provider round trip plus handle choice, then registration.
async fn register(manager: &TestManager, provider: &str, handle: &str) -> keyward_auth::Result<User> {
    let token = SessionToken::generate();
    let consent = manager.registration_step1(&token, provider, "/").await?;
    let state = consent_state(consent.as_str()).unwrap_or_default();
    manager
        .login_step2(&token, "code", &state, "/register", false)
        .await?;
    manager.set_handle(&token, handle).await?;

    manager
        .register_user(&token)
        .await?
        .ok_or_else(|| AuthError::InternalError("session not ready".to_string()))
}

async fn register_concurrently(
    manager: &Arc<TestManager>,
    count: usize,
    handle: &'static str,
) -> Vec<keyward_auth::Result<User>> {
    let tasks: Vec<_> = (0..count)
        .map(|i| {
            let manager = Arc::clone(manager);
            tokio::spawn(async move { register(&manager, &format!("p{i}"), handle).await })
        })
        .collect();

    let mut results = Vec::with_capacity(count);
    for task in tasks {
        results.push(task.await.unwrap_or_else(|e| Err(AuthError::InternalError(e.to_string()))));
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[allow(clippy::unwrap_used)]
async fn test_concurrent_registrations_get_distinct_api_keys() {
    const N: usize = 32;
    let (manager, users) = manager(N);

    let results = register_concurrently(&manager, N, "alice").await;
    let registered: Vec<User> = results.into_iter().map(Result::unwrap).collect();

    let keys: HashSet<ApiKey> = registered.iter().map(|u| u.api_key).collect();
    assert_eq!(keys.len(), N);
    assert_eq!(users.user_count().unwrap(), N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[allow(clippy::unwrap_used)]
async fn test_same_handle_gets_distinct_numbers() {
    const N: usize = 32;
    let (manager, users) = manager(N);

    let results = register_concurrently(&manager, N, "bob").await;
    assert!(results.iter().all(Result::is_ok));

    let stored = users.all_users().unwrap();
    let pairs: HashSet<(String, u16)> = stored
        .iter()
        .map(|u| (u.handle.clone(), u.number))
        .collect();
    assert_eq!(pairs.len(), N);
    assert!(stored.iter().all(|u| u.number <= MAX_HANDLE_NUMBER));
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_full_handle_namespace_is_reported() {
    let (manager, users) = manager(1);
    for number in 0..=MAX_HANDLE_NUMBER {
        users
            .seed(User {
                name: "Taken".to_string(),
                email: format!("taken{number}@x.com"),
                api_key: ApiKey::generate(),
                handle: "carol".to_string(),
                number,
                service: "google".to_string(),
                auth_data: "{}".to_string(),
                active: true,
            })
            .unwrap();
    }

    let result = register(&manager, "p0", "carol").await;
    assert!(matches!(
        result,
        Err(AuthError::RegistrationExhausted { ref handle }) if handle == "carol"
    ));
    assert_eq!(users.user_count().unwrap(), usize::from(MAX_HANDLE_NUMBER) + 1);

    // Another handle is still available to the same identity
    let user = register(&manager, "p0", "carol2").await.unwrap();
    assert_eq!(user.email, "user0@x.com");
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_registered_email_cannot_register_twice() {
    let (manager, _) = manager(1);

    register(&manager, "p0", "dave").await.unwrap();
    let second = register(&manager, "p0", "dave").await;

    assert!(matches!(
        second,
        Err(AuthError::Conflict(keyward_auth::UniqueField::Email))
    ));
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_smallest_key_cap_still_registers() {
    let config = AuthConfig::new("https://keyward.test").with_max_key_attempts(NonZeroU32::MIN);
    let (manager, users) = manager_with_config(1, config);

    let user = register(&manager, "p0", "zed").await.unwrap();

    assert_eq!(user.handle, "zed");
    assert_eq!(users.user_count().unwrap(), 1);
}
