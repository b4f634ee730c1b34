use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::notifications::dtos::{
    MarkAllReadDto, NotificationDto, NotificationQueryParams, UnreadCountDto,
};
use crate::features::notifications::services::NotificationService;
use crate::shared::types::{ApiResponse, Meta};

/// List own notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQueryParams),
    responses(
        (status = 200, description = "Notifications", body = ApiResponse<Vec<NotificationDto>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_notifications(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Query(params): Query<NotificationQueryParams>,
) -> Result<Json<ApiResponse<Vec<NotificationDto>>>> {
    let notifications = service.list(user.id, params.unread_only).await?;
    let total = notifications.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(notifications),
        None,
        Some(Meta::total(total)),
    )))
}

/// Number of unread notifications
#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Unread count", body = ApiResponse<UnreadCountDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unread_count(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<UnreadCountDto>>> {
    let unread = service.unread_count(user.id).await?;
    Ok(Json(ApiResponse::success(
        Some(UnreadCountDto { unread }),
        None,
        None,
    )))
}

/// Mark a notification as read
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = ApiResponse<NotificationDto>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found")
    ),
    tag = "notifications",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<NotificationDto>>> {
    let notification = service.mark_read(user.id, id).await?;
    Ok(Json(ApiResponse::success(Some(notification), None, None)))
}

/// Mark all own notifications as read
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "Notifications marked read", body = ApiResponse<MarkAllReadDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_all_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<MarkAllReadDto>>> {
    let updated = service.mark_all_read(user.id).await?;
    Ok(Json(ApiResponse::success(
        Some(MarkAllReadDto { updated }),
        None,
        None,
    )))
}

#[cfg(test)]
mod tests {
    use crate::features::auth::model::UserRole;
    use crate::features::notifications::routes;
    use crate::features::notifications::services::NotificationService;
    use crate::shared::test_helpers::{lazy_pool, test_user, with_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_requires_identity() {
        let service = Arc::new(NotificationService::new(lazy_pool()));
        let server = TestServer::new(routes::routes(service)).unwrap();

        server
            .get("/api/notifications")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/notifications/read-all")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mark_read_rejects_non_uuid_id() {
        let service = Arc::new(NotificationService::new(lazy_pool()));
        let app = with_user(routes::routes(service), test_user(UserRole::Citizen));
        let server = TestServer::new(app).unwrap();

        server
            .patch("/api/notifications/42/read")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
