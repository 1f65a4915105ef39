//! Keyward HTTP server.
//!
//! Wires the Google provider, the Redis session store and the `PostgreSQL`
//! user store into the Keyward router.
//!
//! # Usage
//!
//! ```bash
//! # Needs PostgreSQL and Redis; see `config.rs` for the variables read
//! DATABASE_URL=postgres://localhost/keyward \
//! OAUTH_PATH=./google_secret.json \
//! cargo run --bin keyward
//! ```

mod config;

use config::Config;
use keyward_auth::providers::{GoogleOAuthProvider, ProviderRegistry};
use keyward_auth::stores::{PostgresUserRepository, RedisSessionStore};
use keyward_auth::{AuthEnvironment, AuthManager};
use keyward_web::{router, AppState};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyward=info,keyward_auth=info,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Keyward server");

    let config = Config::from_env();
    info!(
        base_url = %config.auth.base_url,
        oauth_path = %config.auth.oauth_path.display(),
        "Configuration loaded"
    );

    // Provider secrets are read once; a bad document stops startup
    let google = GoogleOAuthProvider::from_client_secrets(
        &config.auth.oauth_path,
        config.auth.http_timeout,
    )?;
    let providers = ProviderRegistry::new().with_provider("google", google);

    info!("Connecting to user database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;
    let users = PostgresUserRepository::new(pool);
    info!("User database ready");

    info!("Connecting to session store...");
    let sessions = RedisSessionStore::new(&config.redis_url, config.auth.session_ttl).await?;
    info!("Session store connected");

    let manager = AuthManager::new(
        AuthEnvironment::new(providers, users, sessions),
        config.auth.clone(),
    );
    let app = router(AppState::new(manager));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
