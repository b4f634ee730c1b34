use crate::features::users::handlers;
use crate::features::users::services::UserAdminService;
use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;

/// User administration (admin only)
pub fn routes(service: Arc<UserAdminService>) -> Router {
    Router::new()
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/{id}", put(handlers::update_user))
        .with_state(service)
}
