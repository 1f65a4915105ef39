//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by flow.

pub mod health;
pub mod oauth;
pub mod registration;
pub mod session;

// Re-export common handler utilities
pub use health::health_check;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// `302 Found` to `location`.
#[must_use]
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Accept `next` only as a local absolute path; anything else becomes `/`.
///
/// Blocks `//host`, `/\host` and full URLs so a login link cannot bounce the
/// browser to another site.
#[must_use]
pub fn safe_return_url(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_sets_location() {
        let response = found("/login");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn test_safe_return_url() {
        assert_eq!(safe_return_url(Some("/dashboard?tab=1")), "/dashboard?tab=1");
        assert_eq!(safe_return_url(None), "/");
        assert_eq!(safe_return_url(Some("https://evil.example")), "/");
        assert_eq!(safe_return_url(Some("//evil.example")), "/");
        assert_eq!(safe_return_url(Some("/\\evil.example")), "/");
        assert_eq!(safe_return_url(Some("/a\r\nSet-Cookie: x")), "/");
    }
}
