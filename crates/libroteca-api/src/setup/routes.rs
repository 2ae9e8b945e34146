//! Route assembly.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

const API_PREFIX: &str = "/api/v1";

pub fn setup_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health_routes(state.clone()))
        .merge(library_routes(state.clone()))
        .merge(book_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn health_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/queue", get(handlers::health::queue_health))
        .with_state(state)
}

fn library_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{API_PREFIX}/library/refresh"),
            post(handlers::library::refresh_library),
        )
        .route(
            &format!("{API_PREFIX}/library/sync-repository"),
            post(handlers::library::sync_repository),
        )
        .route(
            &format!("{API_PREFIX}/library/enrich"),
            post(handlers::library::enrich_library),
        )
        .with_state(state)
}

fn book_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{API_PREFIX}/books"), get(handlers::books::list_books))
        .route(
            &format!("{API_PREFIX}/books/{{id}}/download"),
            post(handlers::books::download_book),
        )
        .with_state(state)
}
