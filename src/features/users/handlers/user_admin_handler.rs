use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::dtos::UserDto;
use crate::features::auth::guards::RequireAdmin;
use crate::features::users::dtos::{AdminUpdateUserDto, UserQueryParams};
use crate::features::users::services::UserAdminService;
use crate::shared::types::{ApiResponse, Meta};

/// List accounts (paginated)
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQueryParams),
    responses(
        (status = 200, description = "Users ordered by name", body = ApiResponse<Vec<UserDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin access required")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<UserAdminService>>,
    Query(params): Query<UserQueryParams>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>> {
    let pagination = params.pagination();
    let (users, total) = service
        .list(params.role, params.search.as_deref(), &pagination)
        .await?;

    Ok(Json(ApiResponse::success(
        Some(users),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

/// Update an account's role, name or email
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = AdminUpdateUserDto,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin access required"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<UserAdminService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<AdminUpdateUserDto>,
) -> Result<Json<ApiResponse<UserDto>>> {
    dto.validate().map_err(AppError::from_validation)?;

    let user = service.update(id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(user),
        Some("User updated".to_string()),
        None,
    )))
}

#[cfg(test)]
mod tests {
    use crate::features::auth::model::UserRole;
    use crate::features::users::routes;
    use crate::features::users::services::UserAdminService;
    use crate::shared::test_helpers::{lazy_pool, test_user, with_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    fn server(role: UserRole) -> TestServer {
        let service = Arc::new(UserAdminService::new(lazy_pool()));
        TestServer::new(with_user(routes::routes(service), test_user(role))).unwrap()
    }

    #[tokio::test]
    async fn test_non_admins_are_forbidden() {
        for role in [UserRole::Citizen, UserRole::Sector] {
            let server = server(role);
            server
                .get("/api/users")
                .await
                .assert_status(StatusCode::FORBIDDEN);
            server
                .put(&format!("/api/users/{}", Uuid::now_v7()))
                .json(&json!({"role": "admin"}))
                .await
                .assert_status(StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_role() {
        let server = server(UserRole::Admin);

        server
            .put(&format!("/api/users/{}", Uuid::now_v7()))
            .json(&json!({"role": "mayor"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_validates_fields() {
        let server = server(UserRole::Admin);

        server
            .put(&format!("/api/users/{}", Uuid::now_v7()))
            .json(&json!({"email": "nope", "name": ""}))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_role_filter() {
        let server = server(UserRole::Admin);

        server
            .get("/api/users")
            .add_query_param("role", "mayor")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
