pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::Router;
use axum::http::header;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::models::AppState;
use crate::store::{MemoryStore, PgStore, Store};

/// Picks the store from config: PostgreSQL when `DATABASE_URL` is set,
/// otherwise the in-memory store.
pub async fn build_state(cfg: &Config) -> anyhow::Result<AppState> {
    let store: Arc<dyn Store> = match &cfg.database_url {
        Some(url) => Arc::new(PgStore::new(db::connect_pg(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(AppState::new(store, cfg))
}

pub fn app(state: AppState) -> Router {
    // Browser clients call the API from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
