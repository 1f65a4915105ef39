//! Registration handlers.
//!
//! A registration runs the provider round trip through
//! [`register_callback`](super::oauth::register_callback), then posts the
//! chosen handle here.

use super::{found, safe_return_url};
use crate::error::AppError;
use crate::extractors::{follow_rotation, session_token};
use crate::state::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use keyward_auth::providers::{OAuth2Provider, SessionStore, UserRepository};
use keyward_auth::{AuthError, Clock, LoginPhase};
use serde::{Deserialize, Serialize};

/// Registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    /// Requested handle.
    pub handle: String,
}

/// What the registration page needs to render.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    /// `true` once the provider round trip is done and a handle can be posted.
    pub ready: bool,

    /// Email reported by the provider, if known.
    pub email: Option<String>,

    /// Providers a registration can start with (`/register/{provider}`).
    pub providers: Vec<String>,
}

/// Registration page state.
///
/// # Endpoint
///
/// ```text
/// GET /register
/// ```
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn registration_status<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
    headers: HeaderMap,
) -> Result<Json<RegistrationStatus>, AppError>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let providers = state
        .auth
        .environment()
        .providers
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let session = match session_token(&headers, state.config()) {
        Some(token) => state.auth.load_session(&token).await?,
        None => keyward_auth::Session::default(),
    };
    let ready = matches!(
        session.phase(state.auth.now()),
        LoginPhase::Authenticated | LoginPhase::PendingRegistration
    );

    Ok(Json(RegistrationStatus {
        ready,
        email: session.info.map(|info| info.email),
        providers,
    }))
}

/// Create a user for the identity held in the session and log it in.
///
/// # Endpoint
///
/// ```text
/// POST /register
/// Content-Type: application/x-www-form-urlencoded
///
/// handle=alice
/// ```
///
/// # Response
///
/// 302 to the `next` path given when the registration started, with the
/// session cookie moved to a new token.
///
/// # Errors
///
/// - 400 if the session has not completed the provider round trip
/// - 409 if every number of the handle is taken or the email is registered
/// - 422 if the handle is malformed
pub async fn register<O, U, S, C>(
    State(state): State<AppState<O, U, S, C>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError>
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let token = session_token(&headers, state.config()).ok_or(AuthError::OAuthStateMissing)?;

    state.auth.set_handle(&token, form.handle.trim()).await?;

    let Some(user) = state.auth.register_user(&token).await? else {
        return Err(AppError::bad_request(
            "Sign in with a provider before choosing a handle",
        ));
    };

    let bound = state.auth.bind_user(&token, &user).await?;
    let jar = follow_rotation(jar, state.config(), &token, &bound);

    let session = state.auth.load_session(&bound).await?;
    let target = safe_return_url(session.auth.return_to.as_deref());
    Ok((jar, found(&target)).into_response())
}
