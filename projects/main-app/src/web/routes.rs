use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

use super::handlers;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/permission", get(handlers::permission))
        .route("/permission/request", post(handlers::request_permission))
        .route("/cameras", get(handlers::cameras))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
