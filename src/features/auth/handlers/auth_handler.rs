use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::dtos::{
    AuthResponseDto, LoginRequestDto, MeResponseDto, RegisterRequestDto, UpdateProfileDto,
    UserDto,
};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::auth::services::AuthService;
use crate::shared::types::ApiResponse;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use validator::Validate;

/// Register a new citizen account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequestDto,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<AuthResponseDto>),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error")
    ),
    tag = "auth"
)]
pub async fn register(
    State(service): State<Arc<AuthService>>,
    AppJson(dto): AppJson<RegisterRequestDto>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponseDto>>)> {
    dto.validate().map_err(AppError::from_validation)?;

    let auth_response = service.register(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(auth_response), None, None)),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequestDto,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponseDto>),
        (status = 422, description = "Validation error or invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(service): State<Arc<AuthService>>,
    AppJson(dto): AppJson<LoginRequestDto>,
) -> Result<Json<ApiResponse<AuthResponseDto>>> {
    dto.validate().map_err(AppError::from_validation)?;

    let auth_response = service.login(dto).await?;
    Ok(Json(ApiResponse::success(Some(auth_response), None, None)))
}

/// Revoke the current access token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    user: AuthenticatedUser,
    State(service): State<Arc<AuthService>>,
) -> Result<Json<ApiResponse<()>>> {
    service.logout(&user).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Logged out".to_string()),
        None,
    )))
}

/// Get current authenticated user and their realtime channel
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user retrieved successfully", body = ApiResponse<MeResponseDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    user: AuthenticatedUser,
    State(service): State<Arc<AuthService>>,
) -> Result<Json<ApiResponse<MeResponseDto>>> {
    let user_data = service.get_current_user(&user).await?;
    Ok(Json(ApiResponse::success(Some(user_data), None, None)))
}

/// Update own profile
#[utoipa::path(
    put,
    path = "/api/auth/me",
    request_body = UpdateProfileDto,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserDto>),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_me(
    user: AuthenticatedUser,
    State(service): State<Arc<AuthService>>,
    AppJson(dto): AppJson<UpdateProfileDto>,
) -> Result<Json<ApiResponse<UserDto>>> {
    dto.validate().map_err(AppError::from_validation)?;

    let updated = service.update_profile(&user, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(updated),
        Some("Profile updated".to_string()),
        None,
    )))
}

#[cfg(test)]
mod tests {
    use crate::features::auth::model::UserRole;
    use crate::features::auth::routes;
    use crate::features::auth::services::{AuthService, TokenService};
    use crate::shared::test_helpers::{lazy_pool, test_auth_config, test_user, with_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> Arc<AuthService> {
        let pool = lazy_pool();
        let tokens = Arc::new(TokenService::new(pool.clone(), &test_auth_config()));
        Arc::new(AuthService::new(pool, tokens))
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let server = TestServer::new(routes::public_routes(service())).unwrap();

        let response = server
            .post("/api/auth/register")
            .json(&json!({
                "first_name": "Jane",
                "last_name": "Doe",
                "email": "jane@example.com",
                "password": "short"
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], false);
        assert!(body["errors"].is_array());
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_email() {
        let server = TestServer::new(routes::public_routes(service())).unwrap();

        let response = server
            .post("/api/auth/register")
            .json(&json!({
                "first_name": "Jane",
                "last_name": "Doe",
                "email": "not-an-email",
                "password": "long-enough-password"
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_login_rejects_malformed_json() {
        let server = TestServer::new(routes::public_routes(service())).unwrap();

        let response = server
            .post("/api/auth/login")
            .content_type("application/json")
            .bytes("{not json".into())
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_me_validates_before_touching_db() {
        let app = with_user(routes::protected_routes(service()), test_user(UserRole::Citizen));
        let server = TestServer::new(app).unwrap();

        let response = server
            .put("/api/auth/me")
            .json(&json!({ "password": "123" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_me_requires_identity() {
        let server = TestServer::new(routes::protected_routes(service())).unwrap();

        let response = server.get("/api/auth/me").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
