//! Axum extractors acting as authorization guards.
//!
//! - [`ApiKeyUser`]: resolves the `api_key` path or query parameter to an
//!   active user; denial is a bare `401`
//! - [`LoggedIn`]: requires a session cookie pointing at a live session;
//!   denial redirects to the login page
//!
//! Both run the checks in [`keyward_auth::guards`] and log the deny reason
//! at `debug`. The response never reveals it.
//!
//! # Examples
//!
//! ```ignore
//! async fn whoami(ApiKeyUser(user): ApiKeyUser) -> Json<PublicUser> {
//!     Json(user.public())
//! }
//!
//! async fn profile(session: LoggedIn) -> String {
//!     format!("expires at {:?}", session.session.auth.expires)
//! }
//! ```

use crate::error::AppError;
use crate::handlers::found;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query},
    http::{request::Parts, HeaderMap},
    response::{IntoResponse, Response},
    RequestPartsExt,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use keyward_auth::providers::{OAuth2Provider, SessionStore, UserRepository};
use keyward_auth::{
    check_api_key, check_session, AuthConfig, AuthResult, Clock, DenyReason, Session,
    SessionToken, User,
};
use std::collections::HashMap;

/// Name of the path/query parameter carrying an API key.
pub const API_KEY_PARAM: &str = "api_key";

/// Why a guard refused a request, as the client sees it.
#[derive(Debug)]
pub enum GuardRejection {
    /// `401 Unauthorized` with a fixed body.
    Unauthorized,
    /// Redirect to the login page.
    LoginRequired {
        /// Login page path.
        login_path: String,
    },
    /// A store failed while checking.
    Failed(AppError),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => AppError::unauthorized("Unauthorized").into_response(),
            Self::LoginRequired { login_path } => found(&login_path),
            Self::Failed(err) => err.into_response(),
        }
    }
}

/// Session token from the request's cookie, if any.
#[must_use]
pub fn session_token(headers: &HeaderMap, config: &AuthConfig) -> Option<SessionToken> {
    CookieJar::from_headers(headers)
        .get(&config.session_cookie)
        .map(Cookie::value)
        .filter(|value| !value.is_empty())
        .map(|value| SessionToken(value.to_string()))
}

/// Session cookie for `token`: `HttpOnly`, `SameSite=Lax`, path `/`.
#[must_use]
pub fn session_cookie(config: &AuthConfig, token: &SessionToken) -> Cookie<'static> {
    Cookie::build((config.session_cookie.clone(), token.as_str().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Session token to start a handshake under.
///
/// The request's token is reused only if the store holds a session for it.
/// Any other value is ignored and a fresh token is minted with its cookie,
/// so a client never picks the key its session is stored under.
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn ensure_session_token<O, U, S, C>(
    state: &AppState<O, U, S, C>,
    jar: CookieJar,
) -> Result<(CookieJar, SessionToken), AppError>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let config = state.config();
    let presented = jar
        .get(&config.session_cookie)
        .map(Cookie::value)
        .filter(|value| !value.is_empty())
        .map(|value| SessionToken(value.to_string()));

    if let Some(token) = presented {
        if state.auth.environment().sessions.load(&token).await?.is_some() {
            return Ok((jar, token));
        }
        tracing::debug!("Ignoring session cookie with no stored session");
    }

    let token = SessionToken::generate();
    let jar = jar.add(session_cookie(config, &token));
    Ok((jar, token))
}

/// Point the session cookie at `current` if the session moved off
/// `presented`.
#[must_use]
pub fn follow_rotation(
    jar: CookieJar,
    config: &AuthConfig,
    presented: &SessionToken,
    current: &SessionToken,
) -> CookieJar {
    if presented == current {
        jar
    } else {
        jar.add(session_cookie(config, current))
    }
}

/// Handler argument for API routes: the active user owning the presented key.
///
/// The raw key is consumed here and never reaches the handler.
#[derive(Debug, Clone)]
pub struct ApiKeyUser(pub User);

#[async_trait]
impl<O, U, S, C> FromRequestParts<AppState<O, U, S, C>> for ApiKeyUser
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<O, U, S, C>,
    ) -> Result<Self, Self::Rejection> {
        let raw_key = api_key_param(parts).await;
        let users = &state.auth.environment().users;

        match check_api_key(users, raw_key.as_deref())
            .await
            .map_err(|e| GuardRejection::Failed(e.into()))?
        {
            AuthResult::Allowed(user) => Ok(Self(user)),
            AuthResult::Denied(reason) => {
                log_denial(reason, parts);
                Err(GuardRejection::Unauthorized)
            }
        }
    }
}

/// Key from the `api_key` path segment, falling back to the query string.
async fn api_key_param(parts: &mut Parts) -> Option<String> {
    if let Ok(Path(mut params)) = parts.extract::<Path<HashMap<String, String>>>().await {
        if let Some(key) = params.remove(API_KEY_PARAM) {
            return Some(key);
        }
    }

    Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(mut query)| query.remove(API_KEY_PARAM))
}

/// Handler argument for browser pages: a session holding a live credential.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    /// Token the session is stored under.
    pub token: SessionToken,
    /// The session as loaded for this request.
    pub session: Session,
}

#[async_trait]
impl<O, U, S, C> FromRequestParts<AppState<O, U, S, C>> for LoggedIn
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<O, U, S, C>,
    ) -> Result<Self, Self::Rejection> {
        let login_required = || GuardRejection::LoginRequired {
            login_path: state.config().login_path.clone(),
        };

        let Some(token) = session_token(&parts.headers, state.config()) else {
            log_denial(DenyReason::NoSession, parts);
            return Err(login_required());
        };

        let session = state
            .auth
            .environment()
            .sessions
            .load(&token)
            .await
            .map_err(|e| GuardRejection::Failed(e.into()))?;

        match check_session(state.auth.now(), session) {
            AuthResult::Allowed(session) => Ok(Self { token, session }),
            AuthResult::Denied(reason) => {
                log_denial(reason, parts);
                Err(login_required())
            }
        }
    }
}

fn log_denial(reason: DenyReason, parts: &Parts) {
    tracing::debug!(
        reason = reason.as_str(),
        method = %parts.method,
        path = parts.uri.path(),
        "Request denied"
    );
}
