use crate::features::issues::handlers;
use crate::features::issues::services::IssueService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch},
    Router,
};
use std::sync::Arc;

// Room for the form fields and multipart boundaries around the photos
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Public issue feed (no authentication required)
pub fn public_routes(service: Arc<IssueService>) -> Router {
    Router::new()
        .route("/api/public/issues", get(handlers::list_public_issues))
        .with_state(service)
}

/// Issue routes (require bearer authentication)
pub fn protected_routes(service: Arc<IssueService>) -> Router {
    let config = service.config();
    let upload_limit = config.max_images * config.max_image_size + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/api/issues",
            get(handlers::list_issues)
                .post(handlers::create_issue)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/issues/quota", get(handlers::get_quota))
        .route("/api/issues/{id}", get(handlers::get_issue))
        .route(
            "/api/issues/{id}/status",
            patch(handlers::update_issue_status),
        )
        .with_state(service)
}
