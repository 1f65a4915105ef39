//! Session and API-key protected handlers.

use super::found;
use crate::error::AppError;
use crate::extractors::{session_cookie, session_token, ApiKeyUser, LoggedIn};
use crate::state::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use keyward_auth::providers::{OAuth2Provider, SessionStore, UserRepository};
use keyward_auth::{Clock, PublicUser};
use serde::Serialize;

/// Response for the profile page.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    /// Bound user; `None` while a registration is pending.
    pub user: Option<PublicUser>,

    /// Email reported by the provider.
    pub email: Option<String>,

    /// When the provider credential expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Log out.
///
/// # Endpoint
///
/// ```text
/// POST /logout
/// ```
///
/// # Response
///
/// 302 to the login page with the session cookie removed.
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AppError>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let config = state.config();
    let Some(token) = session_token(&headers, config) else {
        return Ok(found(&config.login_path));
    };

    state.auth.logout(&token).await?;
    tracing::info!("Session logged out");

    let jar = jar.remove(session_cookie(config, &token));
    Ok((jar, found(&config.login_path)).into_response())
}

/// Profile of the logged-in browser session.
///
/// # Endpoint
///
/// ```text
/// GET /profile
/// ```
///
/// # Errors
///
/// Returns 500 if the user store fails. Requests without a live session are
/// redirected to the login page before reaching this handler.
pub async fn profile<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
    LoggedIn { session, .. }: LoggedIn,
) -> Result<Json<ProfileResponse>, AppError>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let user = state.auth.current_user(&session).await?;

    Ok(Json(ProfileResponse {
        user: user.as_ref().map(keyward_auth::User::public),
        email: session.info.map(|info| info.email),
        expires_at: session.auth.expires,
    }))
}

/// Identify the owner of an API key.
///
/// # Endpoint
///
/// ```text
/// GET /api/:api_key/whoami
/// GET /api/whoami?api_key=...
/// ```
///
/// # Response
///
/// ```json
/// {
///   "name": "Alice",
///   "email": "a@x.com",
///   "handle": "alice#0042",
///   "service": "google"
/// }
/// ```
#[allow(clippy::unused_async)]
pub async fn whoami(ApiKeyUser(user): ApiKeyUser) -> Json<PublicUser> {
    Json(user.public())
}
