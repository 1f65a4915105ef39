//! Storage implementations for auth system.
//!
//! - **Session Store** (Redis) - Ephemeral session storage with TTL
//! - **User Repository** (PostgreSQL, feature `postgres`) - Durable user records

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod session_redis;

// Re-exports
#[cfg(feature = "postgres")]
pub use postgres::PostgresUserRepository;
pub use session_redis::RedisSessionStore;
