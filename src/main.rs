use std::{str::FromStr, sync::Arc};

use anyhow::Context;
use catcourt::{
    config::Config,
    judge::{CannedJudge, GeminiJudge, JudgmentService},
    rooms::{self, SqliteRoomStore},
    AppState, Markdown,
};
use axum::{debug_handler, response::IntoResponse, routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("catcourt=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(config.session_ttl));

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid DATABASE_URL {}", config.database_url))?
        .create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(connect_options)
        .await
        .context("failed to open the room database")?;

    let store = SqliteRoomStore::new(db_pool);
    store.migrate().await?;

    let judge: Arc<dyn JudgmentService> = match &config.gemini_api_key {
        Some(api_key) => Arc::new(GeminiJudge::new(api_key).with_model(&config.gemini_model)),
        None => {
            tracing::warn!("GEMINI_API_KEY is not set, verdicts will be canned samples");
            Arc::new(CannedJudge)
        }
    };

    let app_state = AppState {
        store: Arc::new(store),
        judge,
        debounce: config.debounce,
    };

    let app = Router::new()
        .route("/", get(hello))
        .nest("/r", rooms::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "cat court is in session");
    axum::serve(listener, app).await?;
    Ok(())
}

#[debug_handler]
async fn hello() -> impl IntoResponse {
    Markdown(include_str!("../README.md"))
}
