//! Mock user repository for testing.

use super::lock_poisoned;
use crate::error::{AuthError, Result, UniqueField};
use crate::providers::{User, UserRepository};
use crate::state::ApiKey;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<ApiKey, User>,
    by_email: HashMap<String, ApiKey>,
    by_handle: HashMap<(String, u16), ApiKey>,
    forced_conflicts: VecDeque<UniqueField>,
}

impl Tables {
    fn conflict(&self, user: &User) -> Option<UniqueField> {
        if self.users.contains_key(&user.api_key) {
            Some(UniqueField::ApiKey)
        } else if self.by_handle.contains_key(&(user.handle.clone(), user.number)) {
            Some(UniqueField::Handle)
        } else if self.by_email.contains_key(&user.email) {
            Some(UniqueField::Email)
        } else {
            None
        }
    }

    fn put(&mut self, user: User) {
        if let Some(old) = self.users.get(&user.api_key) {
            self.by_email.remove(&old.email);
            self.by_handle.remove(&(old.handle.clone(), old.number));
        }
        self.by_email.insert(user.email.clone(), user.api_key);
        self.by_handle.insert((user.handle.clone(), user.number), user.api_key);
        self.users.insert(user.api_key, user);
    }

    fn lookup(&self, key: Option<&ApiKey>) -> Option<User> {
        key.and_then(|key| self.users.get(key)).cloned()
    }
}

/// Mock user repository.
///
/// A single lock guards every table, so `insert_user` checks all unique
/// fields and inserts atomically. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MockUserRepository {
    tables: Arc<Mutex<Tables>>,
    lookups: Arc<AtomicUsize>,
}

impl MockUserRepository {
    /// Create a new mock user repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user, bypassing uniqueness checks (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn seed(&self, user: User) -> Result<()> {
        self.tables.lock().map_err(lock_poisoned)?.put(user);
        Ok(())
    }

    /// Make the next `insert_user` calls fail with these conflicts, in order,
    /// as if a concurrent registration had won the race.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn force_conflicts(&self, fields: impl IntoIterator<Item = UniqueField>) -> Result<()> {
        self.tables
            .lock()
            .map_err(lock_poisoned)?
            .forced_conflicts
            .extend(fields);
        Ok(())
    }

    /// Get count of stored users (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn user_count(&self) -> Result<usize> {
        Ok(self.tables.lock().map_err(lock_poisoned)?.users.len())
    }

    /// Every stored user (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn all_users(&self) -> Result<Vec<User>> {
        Ok(self
            .tables
            .lock()
            .map_err(lock_poisoned)?
            .users
            .values()
            .cloned()
            .collect())
    }

    /// Number of lookups served (for testing).
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().map_err(lock_poisoned)?;
        Ok(f(&tables))
    }
}

impl UserRepository for MockUserRepository {
    fn get_user_by_api_key(
        &self,
        api_key: ApiKey,
    ) -> impl Future<Output = Result<Option<User>>> + Send {
        let result = self.read(|t| t.lookup(Some(&api_key)));
        async move { result }
    }

    fn get_user_by_email(&self, email: &str) -> impl Future<Output = Result<Option<User>>> + Send {
        let result = self.read(|t| t.lookup(t.by_email.get(email)));
        async move { result }
    }

    fn get_user_by_handle(
        &self,
        handle: &str,
        number: u16,
    ) -> impl Future<Output = Result<Option<User>>> + Send {
        let result = self.read(|t| t.lookup(t.by_handle.get(&(handle.to_string(), number))));
        async move { result }
    }

    fn insert_user(&self, user: &User) -> impl Future<Output = Result<()>> + Send {
        let tables = Arc::clone(&self.tables);
        let user = user.clone();

        async move {
            let mut tables_guard = tables.lock().map_err(lock_poisoned)?;

            if let Some(field) = tables_guard.forced_conflicts.pop_front() {
                return Err(AuthError::Conflict(field));
            }
            if let Some(field) = tables_guard.conflict(&user) {
                return Err(AuthError::Conflict(field));
            }

            tables_guard.put(user);
            Ok(())
        }
    }

    fn update_user(&self, user: &User) -> impl Future<Output = Result<bool>> + Send {
        let tables = Arc::clone(&self.tables);
        let user = user.clone();

        async move {
            let mut tables_guard = tables.lock().map_err(lock_poisoned)?;
            if !tables_guard.users.contains_key(&user.api_key) {
                return Ok(false);
            }
            tables_guard.put(user);
            Ok(true)
        }
    }
}
