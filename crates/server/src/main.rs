mod coach;
mod error;
mod routes;
mod store;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use coach::GeminiClient;
use store::{SqliteStore, Store};

/// Handlers take the store behind its trait surface, so any backing that
/// satisfies the store contracts can be swapped in.
pub type SharedStore = Arc<dyn Store>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub coach: GeminiClient,
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for GeminiClient {
    fn from_ref(state: &AppState) -> Self {
        state.coach.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focuslog_server=info,tower_http=info".into()),
        )
        .init();

    // Data directory
    let data_dir = std::env::var("FOCUSLOG_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    let store = SqliteStore::open(&data_dir)?;
    tracing::info!("database initialized");

    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set — /ai will answer with the fallback message");
    }
    let coach = GeminiClient::new(api_key);
    tracing::info!("generation model: {}", coach.model());

    let state = AppState {
        store: Arc::new(store),
        coach,
    };

    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Users
        .route("/user/register", post(routes::users::register))
        // Groups
        .route("/group/create", post(routes::groups::create))
        .route("/group/join", post(routes::groups::join))
        .route("/group/my-groups/{user_id}", get(routes::groups::my_groups))
        .route("/group/leave", post(routes::groups::leave))
        // Leaderboard
        .route("/leaderboard/{group_code}", get(routes::leaderboard::leaderboard))
        // Stats sync
        .route("/stats/sync", post(routes::sync::sync))
        // AI coach
        .route("/ai", post(routes::ai::ai));

    let app = Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    tracing::info!("starting server at {base_url}");

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
