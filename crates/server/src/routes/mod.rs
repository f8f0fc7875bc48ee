use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod catalog;
mod family;
mod health;
mod rentals;
mod stores;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Store lifecycle
        .route("/api/migrate", post(stores::migrate))
        .route("/api/switch/relational", post(stores::switch_to_relational))
        .route("/api/reset/documents", post(stores::reset_documents))
        .route("/api/reset/relational", post(stores::reset_relational))
        .route("/api/stats", get(stores::stats))
        // Active rental window
        .route("/api/users/:user_id/family-media", get(family::family_media))
        .route("/api/family-media", get(family::family_overview))
        // Listings and rentals on the live store
        .route("/api/users", get(catalog::list_users))
        .route("/api/media", get(catalog::list_media))
        .route("/api/users/:user_id/rentals", get(catalog::user_rentals))
        .route("/api/rentals", post(rentals::rent))
        .route("/api/watch", post(rentals::watch))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
