//! Route table.
//!
//! `/login` and `/register` are the defaults of
//! [`AuthConfig::login_path`](keyward_auth::AuthConfig::login_path) and
//! [`AuthConfig::register_path`](keyward_auth::AuthConfig::register_path);
//! the routes follow the configured values.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /health` | liveness |
//! | `GET /login` | login page (provider list) |
//! | `GET /login/:provider` | login step 1 |
//! | `GET /oauth/:provider` | login step 2 |
//! | `GET /register` | registration page state |
//! | `POST /register` | create user from session + handle |
//! | `GET /register/:provider` | registration round trip (both steps) |
//! | `POST /logout` | flush session |
//! | `GET /profile` | session guarded |
//! | `GET /api/:api_key/whoami`, `GET /api/whoami` | API-key guarded |

use crate::handlers::{health, oauth, registration, session};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use keyward_auth::providers::{OAuth2Provider, SessionStore, UserRepository};
use keyward_auth::Clock;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Build the router with every Keyward route, tracing and request IDs.
///
/// # Panics
///
/// Panics if the configured login and register paths collide with each
/// other or with a fixed route, as [`Router::route`] does for overlapping
/// routes.
pub fn router<O, U, S, C>(state: AppState<O, U, S, C>) -> Router
where
    O: OAuth2Provider + 'static,
    U: UserRepository + 'static,
    S: SessionStore + 'static,
    C: Clock + 'static,
{
    let login_path = state.config().login_path.clone();
    let register_path = state.config().register_path.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route(&login_path, get(oauth::login_options::<O, U, S, C>))
        .route(
            &provider_route(&login_path),
            get(oauth::login::<O, U, S, C>),
        )
        .route("/oauth/:provider", get(oauth::oauth_callback::<O, U, S, C>))
        .route(
            &register_path,
            get(registration::registration_status::<O, U, S, C>)
                .post(registration::register::<O, U, S, C>),
        )
        .route(
            &provider_route(&register_path),
            get(oauth::register_callback::<O, U, S, C>),
        )
        .route("/logout", post(session::logout::<O, U, S, C>))
        .route("/profile", get(session::profile::<O, U, S, C>))
        .route("/api/:api_key/whoami", get(session::whoami))
        .route("/api/whoami", get(session::whoami))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// `{base}/:provider`.
fn provider_route(base: &str) -> String {
    format!("{}/:provider", base.trim_end_matches('/'))
}
