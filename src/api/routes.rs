use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::*;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/plan", get(get_plan))
        .route("/api/missions", post(start_mission))
        .route("/api/missions/:id", get(get_mission))
        .route("/api/missions/:id/abort", post(abort_mission))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
        )
        .with_state(state)
}
