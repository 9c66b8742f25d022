//! scoreboard-back binary entrypoint wiring REST, SSE, authentication and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use scoreboard_back::{
    config::AppConfig,
    dao::score_store::{ScoreStore, memory::MemoryScoreStore},
    routes,
    services::{
        auth_service::{Authenticator, StaticTokenAuthenticator},
        storage_supervisor,
    },
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config, select_authenticator());

    spawn_storage(app_state.clone());
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// `ADMIN_TOKEN` wins; otherwise tokens are checked against Supabase auth when configured.
fn select_authenticator() -> Arc<dyn Authenticator> {
    let admin_token = env::var("ADMIN_TOKEN").ok();
    let fixed = StaticTokenAuthenticator::new(admin_token);
    if fixed.is_configured() {
        info!("operator routes protected by ADMIN_TOKEN");
        return Arc::new(fixed);
    }

    #[cfg(feature = "supabase-store")]
    {
        use scoreboard_back::{
            dao::score_store::supabase::SupabaseConfig,
            services::auth_service::SupabaseAuthenticator,
        };

        if let Ok(config) = SupabaseConfig::from_env() {
            info!("operator routes protected by Supabase auth");
            return Arc::new(SupabaseAuthenticator::new(&config));
        }
    }

    warn!("no ADMIN_TOKEN or Supabase credentials; operator routes will reject every request");
    Arc::new(fixed)
}

/// Start the storage supervisor with Supabase when configured, in-memory storage otherwise.
fn spawn_storage(state: SharedState) {
    #[cfg(feature = "supabase-store")]
    {
        use scoreboard_back::dao::{
            score_store::supabase::{ChangeListener, SupabaseConfig, SupabaseScoreStore},
            storage::StorageError,
        };

        match SupabaseConfig::from_env() {
            Ok(config) => {
                info!(url = %config.trimmed_url(), "using Supabase score store");
                let feed = state.feed().clone();
                match SupabaseScoreStore::new(config.clone(), feed.clone()) {
                    Ok(store) => {
                        tokio::spawn(ChangeListener::new(store).run());
                    }
                    Err(err) => {
                        error!(error = %err, "cannot start the storage change listener");
                    }
                }
                tokio::spawn(storage_supervisor::run(state, move || {
                    let config = config.clone();
                    let feed = feed.clone();
                    async move {
                        let store = SupabaseScoreStore::connect(config, feed).await?;
                        Ok::<Arc<dyn ScoreStore>, StorageError>(Arc::new(store))
                    }
                }));
                return;
            }
            Err(err) => warn!(error = %err, "Supabase not configured; using in-memory storage"),
        }
    }

    let store: Arc<dyn ScoreStore> = Arc::new(MemoryScoreStore::new(state.feed().clone()));
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok(store) }
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
