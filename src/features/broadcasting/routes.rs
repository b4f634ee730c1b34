use crate::features::broadcasting::handlers;
use crate::features::broadcasting::services::ChannelAuthService;
use axum::{routing::post, Router};
use std::sync::Arc;

/// Channel auth routes (require bearer authentication)
pub fn protected_routes(service: Arc<ChannelAuthService>) -> Router {
    Router::new()
        .route("/broadcasting/auth", post(handlers::authorize_channel))
        .with_state(service)
}
