use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::http::handlers::{health, stream, swarms, workers};
use crate::http::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        // Swarm routes
        .route("/api/swarms", get(swarms::list_swarms))
        .route("/api/swarms/{id}", get(swarms::get_swarm))
        // Worker routes
        .route("/api/swarms/{id}/workers", get(workers::list_workers))
        .route("/api/swarms/{id}/workers/{worker_id}", get(workers::get_worker))
        // Live event feed
        .route("/api/events", get(stream::event_stream))
        .layer(cors)
        .with_state(state)
}
