use crate::core::error::Result;
use crate::core::extractor::JsonOrForm;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::broadcasting::dtos::{ChannelAuthRequestDto, ChannelAuthResponseDto};
use crate::features::broadcasting::services::ChannelAuthService;
use axum::{extract::State, Json};
use std::sync::Arc;

/// Authorize a private channel subscription
///
/// Accepts `application/x-www-form-urlencoded` or JSON bodies.
#[utoipa::path(
    post,
    path = "/broadcasting/auth",
    request_body = ChannelAuthRequestDto,
    responses(
        (status = 200, description = "Subscription signed", body = ChannelAuthResponseDto),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Channel not allowed for this identity"),
        (status = 422, description = "Malformed socket id")
    ),
    tag = "broadcasting",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn authorize_channel(
    user: AuthenticatedUser,
    State(service): State<Arc<ChannelAuthService>>,
    JsonOrForm(dto): JsonOrForm<ChannelAuthRequestDto>,
) -> Result<Json<ChannelAuthResponseDto>> {
    let response = service.authorize(&user, &dto.socket_id, &dto.channel_name)?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use crate::features::auth::model::UserRole;
    use crate::features::broadcasting::routes;
    use crate::features::broadcasting::services::ChannelAuthService;
    use crate::features::broadcasting::signature::PusherSigner;
    use crate::shared::test_helpers::{test_user, with_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use std::sync::Arc;

    fn server(role: UserRole) -> (TestServer, uuid::Uuid) {
        let user = test_user(role);
        let id = user.id;
        let service = Arc::new(ChannelAuthService::new(Some(PusherSigner::new(
            "key", "secret",
        ))));
        let app = with_user(routes::protected_routes(service), user);
        (TestServer::new(app).unwrap(), id)
    }

    #[tokio::test]
    async fn test_form_body_is_accepted() {
        let (server, id) = server(UserRole::Citizen);
        let channel = format!("private-user.{}", id);

        let response = server
            .post("/broadcasting/auth")
            .form(&[("socket_id", "12.34"), ("channel_name", channel.as_str())])
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(body["auth"].as_str().unwrap().starts_with("key:"));
    }

    #[tokio::test]
    async fn test_json_body_is_accepted() {
        let (server, id) = server(UserRole::Sector);

        let response = server
            .post("/broadcasting/auth")
            .json(&serde_json::json!({
                "socket_id": "12.34",
                "channel_name": format!("private-sector.{}", id),
            }))
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_foreign_channel_is_forbidden() {
        let (server, _) = server(UserRole::Citizen);

        let response = server
            .post("/broadcasting/auth")
            .json(&serde_json::json!({
                "socket_id": "12.34",
                "channel_name": format!("private-user.{}", uuid::Uuid::now_v7()),
            }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bad_socket_id_is_unprocessable() {
        let (server, id) = server(UserRole::Citizen);

        let response = server
            .post("/broadcasting/auth")
            .json(&serde_json::json!({
                "socket_id": "abc",
                "channel_name": format!("private-user.{}", id),
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
}
