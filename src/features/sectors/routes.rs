use crate::features::sectors::handlers;
use crate::features::sectors::services::SectorService;
use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;

/// Sector list for the report form (no authentication required)
pub fn public_routes(service: Arc<SectorService>) -> Router {
    Router::new()
        .route("/api/public/sectors", get(handlers::list_public_sectors))
        .with_state(service)
}

/// Sector administration (admin only)
pub fn protected_routes(service: Arc<SectorService>) -> Router {
    Router::new()
        .route(
            "/api/sectors",
            get(handlers::list_sectors).post(handlers::create_sector),
        )
        .route(
            "/api/sectors/{id}",
            put(handlers::update_sector).delete(handlers::delete_sector),
        )
        .with_state(service)
}
