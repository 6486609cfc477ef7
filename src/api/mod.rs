//! HTTP API module
//!
//! Local control surface over the timer model: structural edits, commands
//! for the selected timer, status, and an HTTP entry point for peer messages.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", post(create_timer_handler))
        .route("/timers/move", post(move_timer_handler))
        .route("/timers/:section/:item", delete(remove_timer_handler))
        .route("/timers/:section/:item/select", post(select_timer_handler))
        .route("/command/:command", post(command_handler))
        .route("/model", get(model_handler))
        .route("/peer", post(peer_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
