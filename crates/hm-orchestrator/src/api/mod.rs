//! HTTP API
//!
//! Thin glue over [`ManagerState`]: handlers parse the request, call one
//! orchestration operation and serialize the result.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::ManagerState;

pub use error::ApiError;

/// Build the API router
pub fn router(state: Arc<ManagerState>) -> Router {
    Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/logs", get(handlers::logs))
        .route("/api/logs/stream", get(handlers::stream_logs))
        .route("/api/restart/:target", get(handlers::restart))
        .route("/api/clients", get(handlers::list_clients).post(handlers::add_client))
        .route("/api/clients/:id", delete(handlers::remove_client))
        .route("/api/server/status", get(handlers::server_status))
        .route("/api/server/setup", post(handlers::setup_server))
        .route("/api/server/install", post(handlers::install_server))
        .with_state(state)
}
