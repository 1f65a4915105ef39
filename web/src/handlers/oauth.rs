//! OAuth2 login handlers.
//!
//! Implements the two steps of the authorization-code flow for browsers.

use super::{found, safe_return_url};
use crate::error::AppError;
use crate::extractors::{ensure_session_token, follow_rotation, session_token};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use keyward_auth::providers::{OAuth2Provider, SessionStore, UserRepository};
use keyward_auth::{AuthError, Clock};
use serde::{Deserialize, Serialize};

/// Query parameters of the login route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginQuery {
    /// Local path to return to after login (defaults to `/`).
    pub next: Option<String>,
}

/// Query parameters the provider sends back to the callback route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code.
    pub code: Option<String>,

    /// CSRF state issued at step 1, echoed by the provider.
    pub state: Option<String>,

    /// Error reported by the provider (e.g. `access_denied`).
    pub error: Option<String>,
}

/// Login page contents.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOptions {
    /// Configured providers; log in at `/login/{provider}`.
    pub providers: Vec<String>,
}

/// Login page: where guards send browsers without a live session.
///
/// # Endpoint
///
/// ```text
/// GET /login
/// ```
#[allow(clippy::unused_async)]
pub async fn login_options<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
) -> Json<LoginOptions>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let providers = state.auth.environment().providers.names();
    Json(LoginOptions {
        providers: providers.into_iter().map(str::to_string).collect(),
    })
}

/// Start a login.
///
/// # Endpoint
///
/// ```text
/// GET /login/:provider?next=/dashboard
/// ```
///
/// # Response
///
/// HTTP 302 redirect to the provider's consent page. A session cookie is
/// issued unless the request carried one for a stored session.
///
/// # Errors
///
/// Returns 400 if the provider is not configured.
pub async fn login<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let (jar, token) = ensure_session_token(&state, jar).await?;
    let next = safe_return_url(query.next.as_deref());

    let consent = state.auth.login_step1(&token, &provider, &next).await?;
    Ok((jar, found(consent.as_str())))
}

/// Provider callback: complete login.
///
/// # Endpoint
///
/// ```text
/// GET /oauth/:provider?code=...
/// ```
///
/// # Response
///
/// - Known user: 302 to the `next` path given at login, with the session
///   cookie moved to a new token
/// - Unknown user: session cleared, 302 to the registration page
/// - Provider reported an error or sent no code: 302 to the login page
///
/// # Errors
///
/// Returns 400 without a login in progress or with a `state` that was not
/// issued to this session, 502 if the provider fails.
pub async fn oauth_callback<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
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
    let (Some(code), None) = (query.code, query.error.as_deref()) else {
        tracing::warn!(provider, error = ?query.error, "Provider did not return a code");
        return Ok(found(&config.login_path));
    };
    let token = session_token(&headers, config).ok_or(AuthError::OAuthStateMissing)?;

    let session = state.auth.load_session(&token).await?;
    let next = safe_return_url(session.auth.return_to.as_deref());

    let csrf = query.state.unwrap_or_default();
    match state.auth.login_step2(&token, &code, &csrf, &next, true).await {
        Ok(outcome) => {
            let jar = follow_rotation(jar, config, &token, &outcome.token);
            Ok((jar, found(outcome.target.as_str())).into_response())
        }
        Err(AuthError::UserNotRegistered) => Ok(found(&config.register_path)),
        Err(e) => Err(e.into()),
    }
}

/// Start or finish the provider round trip of a registration.
///
/// # Endpoint
///
/// ```text
/// GET /register/:provider?next=/welcome           (start)
/// GET /register/:provider?code=...&state=...      (provider callback)
/// ```
///
/// # Response
///
/// Without a code: 302 to the consent page, as for login. With a code: the
/// identity is stored in the session without looking the user up, then 302
/// to the registration page where the handle is chosen.
///
/// # Errors
///
/// Returns 400 for an unknown provider, missing login state or a foreign
/// `state`, 502 if the provider fails.
pub async fn register_callback<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
    Path(provider): Path<String>,
    Query(callback): Query<CallbackQuery>,
    Query(login): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<Response, AppError>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let (jar, token) = ensure_session_token(&state, jar).await?;
    let register_path = state.config().register_path.clone();

    if let Some(error) = callback.error {
        tracing::warn!(provider, error, "Provider refused registration login");
        return Ok((jar, found(&register_path)).into_response());
    }

    let (jar, target) = match callback.code {
        None => {
            let next = safe_return_url(login.next.as_deref());
            let consent = state.auth.registration_step1(&token, &provider, &next).await?;
            (jar, consent)
        }
        Some(code) => {
            let csrf = callback.state.unwrap_or_default();
            let outcome = state
                .auth
                .login_step2(&token, &code, &csrf, &register_path, false)
                .await?;
            (
                follow_rotation(jar, state.config(), &token, &outcome.token),
                outcome.target,
            )
        }
    };

    Ok((jar, found(target.as_str())).into_response())
}
