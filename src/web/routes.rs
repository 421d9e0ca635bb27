use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// Service info
pub fn root_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(handlers::api::index))
}

// API Routes - REST API for the frontend
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .route("/health", get(handlers::api::health))

            // Generation
            .route("/generate-sql", post(handlers::api::generate_sql))
            .route("/generate-schema", post(handlers::api::generate_schema))

            // Query history and versions
            .route("/history", get(handlers::api::history))
            .route("/history/{id}", delete(handlers::api::delete_history))
            .route(
                "/history/{id}/versions",
                get(handlers::api::query_versions).post(handlers::api::create_query_version),
            )

            // Schemas and favorites
            .route("/schema-versions", get(handlers::api::schema_versions))
            .route("/save", post(handlers::api::save_item))

            .route("/analytics", get(handlers::api::analytics))

            // Assistant chat
            .route("/chat", post(handlers::api::chat))
            .route("/chat/history", get(handlers::api::chat_history)),
    )
}
