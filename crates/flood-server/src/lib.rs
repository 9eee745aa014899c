pub mod db;
pub mod leaderboard;
pub mod recorder;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;

pub use crate::state::Config;
use crate::state::AppState;

/// Scheduled rebuilds that outrun this deadline are abandoned and retried
/// on the next tick.
const REBUILD_TIMEOUT: Duration = Duration::from_secs(60);

/// Build a fully configured Router + shared state.
pub async fn build_app(db_url: &str, config: Config) -> (Router, Arc<AppState>) {
    // In-memory databases exist per connection; keep a single one so every
    // handle sees the same data.
    let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .expect("Failed to connect to SQLite");

    db::init_db(&pool)
        .await
        .expect("Failed to initialize database");

    let state = Arc::new(AppState { db: pool, config });

    // Spawn the periodic leaderboard rebuild task.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(state.config.rebuild_interval);
            loop {
                interval.tick().await;
                match tokio::time::timeout(REBUILD_TIMEOUT, leaderboard::rebuild_all(&state.db))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => tracing::warn!(%err, "scheduled rebuild failed"),
                    Err(_) => tracing::warn!("scheduled rebuild timed out"),
                }
            }
        });
    }

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/auth/guest", post(routes::guest_auth))
        .route("/attempts", post(routes::record_attempt))
        .route(
            "/leaderboard/{category}/{subcategory}",
            get(routes::read_leaderboard),
        )
        .route("/profile/{username}", get(routes::profile))
        .route("/admin/puzzles", post(routes::seed_puzzle))
        .route("/admin/rebuild", post(routes::trigger_rebuild))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}
