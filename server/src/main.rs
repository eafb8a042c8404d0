mod config;
mod db;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::board::{BoardStore, PgBoardStore};
use crate::services::memory::MemoryBoardStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::ServerConfig::from_env();

    let store: Arc<dyn BoardStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            tracing::info!(max_connections = config.db_max_connections, "postgres board store ready");
            Arc::new(PgBoardStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; boards are kept in memory and lost on restart");
            Arc::new(MemoryBoardStore::new())
        }
    };

    let state = state::AppState::new(store, config.client_channel_capacity);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "whiteboard relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
