//! User repository trait.

use crate::error::Result;
use crate::state::ApiKey;
use super::User;

/// User repository.
///
/// This trait abstracts over the durable user store. Lookups return
/// `Ok(None)` on a miss.
///
/// # Uniqueness
///
/// `api_key`, `(handle, number)` and `email` are each unique.
/// [`insert_user`](Self::insert_user) must enforce all three atomically
/// (unique indexes, or a single critical section) and report a collision as
/// `AuthError::Conflict`. Registration relies on this: its
/// check-then-insert is optimistic and may race with another registration.
pub trait UserRepository: Send + Sync {
    /// Get user by API key.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    fn get_user_by_api_key(
        &self,
        api_key: ApiKey,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    /// Get user by email.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    fn get_user_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    /// Get user by `(handle, number)`.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    fn get_user_by_handle(
        &self,
        handle: &str,
        number: u16,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    /// Insert a new user if none of its unique fields is taken.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A unique field is taken → `AuthError::Conflict`
    /// - The store query fails
    fn insert_user(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Persist changes to an existing user, matched by API key.
    ///
    /// Returns `false` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    fn update_user(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}
