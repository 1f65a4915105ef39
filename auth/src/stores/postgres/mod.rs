//! PostgreSQL storage implementations.
//!
//! This module provides persistent storage using PostgreSQL for user
//! accounts. The schema is managed outside this crate; the expected table is
//! documented on [`PostgresUserRepository`].

pub mod user;

// Re-exports
pub use user::PostgresUserRepository;
