//! PostgreSQL user repository implementation.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     api_key   UUID        PRIMARY KEY,
//!     email     TEXT        NOT NULL CONSTRAINT users_email_key UNIQUE,
//!     name      TEXT        NOT NULL,
//!     handle    TEXT        NOT NULL,
//!     number    SMALLINT    NOT NULL CHECK (number BETWEEN 0 AND 9999),
//!     service   TEXT        NOT NULL,
//!     auth_data TEXT        NOT NULL,
//!     active    BOOLEAN     NOT NULL DEFAULT TRUE,
//!     CONSTRAINT users_handle_number_key UNIQUE (handle, number)
//! );
//! ```
//!
//! The unique indexes make `insert_user` an atomic insert-if-absent; a
//! violation is reported as `AuthError::Conflict` naming the field.
//!
//! # Example
//!
//! ```no_run
//! use keyward_auth::stores::postgres::PostgresUserRepository;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/keyward").await?;
//! let repo = PostgresUserRepository::new(pool);
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result, UniqueField};
use crate::providers::{User, UserRepository};
use crate::state::ApiKey;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const SELECT_USER: &str = r"
    SELECT api_key, email, name, handle, number, service, auth_data, active
    FROM users
";

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PostgresUserRepository {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new PostgreSQL user repository.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, bind: Bind<'_>) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE {clause}");
        let query = sqlx::query(&sql);
        let query = match bind {
            Bind::ApiKey(key) => query.bind(key.0),
            Bind::Email(email) => query.bind(email),
            Bind::Handle(handle, number) => query.bind(handle).bind(i16::try_from(number).map_err(
                |_| AuthError::InternalError(format!("handle number out of range: {number}")),
            )?),
        };

        query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to get user: {e}")))?
            .map(|row| user_from_row(&row))
            .transpose()
    }
}

enum Bind<'a> {
    ApiKey(ApiKey),
    Email(&'a str),
    Handle(&'a str, u16),
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let decode = |e: sqlx::Error| AuthError::DatabaseError(format!("Failed to decode user: {e}"));

    let number: i16 = row.try_get("number").map_err(decode)?;
    Ok(User {
        api_key: ApiKey(row.try_get("api_key").map_err(decode)?),
        email: row.try_get("email").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        handle: row.try_get("handle").map_err(decode)?,
        number: u16::try_from(number)
            .map_err(|_| AuthError::DatabaseError(format!("Negative handle number {number}")))?,
        service: row.try_get("service").map_err(decode)?,
        auth_data: row.try_get("auth_data").map_err(decode)?,
        active: row.try_get("active").map_err(decode)?,
    })
}

/// Map a unique-violation constraint name to the field it protects.
fn unique_field(constraint: Option<&str>) -> UniqueField {
    match constraint {
        Some(name) if name.contains("email") => UniqueField::Email,
        Some(name) if name.contains("handle") => UniqueField::Handle,
        _ => UniqueField::ApiKey,
    }
}

impl UserRepository for PostgresUserRepository {
    async fn get_user_by_api_key(&self, api_key: ApiKey) -> Result<Option<User>> {
        self.fetch_one_where("api_key = $1", Bind::ApiKey(api_key)).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("email = $1", Bind::Email(email)).await
    }

    async fn get_user_by_handle(&self, handle: &str, number: u16) -> Result<Option<User>> {
        self.fetch_one_where("handle = $1 AND number = $2", Bind::Handle(handle, number))
            .await
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let number = i16::try_from(user.number).map_err(|_| AuthError::InvalidHandle {
            reason: format!("number {} out of range", user.number),
        })?;

        sqlx::query(
            r"
            INSERT INTO users
                (api_key, email, name, handle, number, service, auth_data, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(user.api_key.0)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.handle)
        .bind(number)
        .bind(&user.service)
        .bind(&user.auth_data)
        .bind(user.active)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AuthError::Conflict(unique_field(db_err.constraint()));
                }
            }
            AuthError::DatabaseError(format!("Failed to create user: {e}"))
        })?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET name = $2, auth_data = $3, active = $4
            WHERE api_key = $1
            ",
        )
        .bind(user.api_key.0)
        .bind(&user.name)
        .bind(&user.auth_data)
        .bind(user.active)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to update user: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
