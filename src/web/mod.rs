//! The HTTP transport boundary: thin handlers delegating to the
//! orchestrator, response shaping, and router composition.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::orchestrator::TaggingOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TaggingOrchestrator>,
    /// A run started through `tag_playlist` is cancelled at its next safe
    /// point once this much time has elapsed, per the run deadline.
    pub run_deadline: Duration,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/playlists/tag", post(handlers::tag_playlist))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
