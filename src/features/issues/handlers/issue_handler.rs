use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireReporter;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::dtos::{
    CreateIssueForm, ImageUpload, IssueDto, IssueQueryParams, NewIssueForm,
    PublicIssueQueryParams, QuotaStatusDto, UpdateIssueStatusDto,
};
use crate::features::issues::models::IssueStatus;
use crate::features::issues::services::{IssueFilter, IssueService};
use crate::shared::types::{ApiResponse, Meta};

/// Submit an issue
///
/// Accepts multipart/form-data with `description`, `sector_id`, `latitude`,
/// `longitude` and repeated `images` (or `images[]`) files.
#[utoipa::path(
    post,
    path = "/api/issues",
    tag = "issues",
    request_body(
        content = CreateIssueForm,
        content_type = "multipart/form-data",
        description = "Issue report with up to five photos",
    ),
    responses(
        (status = 201, description = "Issue submitted", body = ApiResponse<IssueDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Sector accounts cannot submit issues"),
        (status = 413, description = "Upload too large"),
        (status = 422, description = "Validation error"),
        (status = 429, description = "Weekly submission limit reached")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_issue(
    RequireReporter(user): RequireReporter,
    State(service): State<Arc<IssueService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<IssueDto>>)> {
    // Over-quota reporters get 429 even when the form is also invalid
    service.ensure_quota_available(user.id).await?;

    let mut form = NewIssueForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "images" | "images[]" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;

                form.images.push(ImageUpload {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            "description" | "sector_id" | "latitude" | "longitude" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read {} field: {}", field_name, e))
                })?;
                let slot = match field_name.as_str() {
                    "description" => &mut form.description,
                    "sector_id" => &mut form.sector_id,
                    "latitude" => &mut form.latitude,
                    _ => &mut form.longitude,
                };
                *slot = Some(text);
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let input = form.validate(service.config())?;
    let issue = service.create(&user, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(issue),
            Some("Issue submitted".to_string()),
            None,
        )),
    ))
}

fn multipart_error(e: MultipartError) -> AppError {
    debug!("Failed to read multipart data: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the allowed size".to_string())
    } else {
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    }
}

/// List issues visible to the caller
///
/// Admins see every issue, sectors the issues assigned to them and citizens
/// their own reports.
#[utoipa::path(
    get,
    path = "/api/issues",
    params(IssueQueryParams),
    responses(
        (status = 200, description = "Issues", body = ApiResponse<Vec<IssueDto>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "issues",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_issues(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
    Query(params): Query<IssueQueryParams>,
) -> Result<Json<ApiResponse<Vec<IssueDto>>>> {
    let pagination = params.pagination();
    let filter = IssueFilter {
        status: params.status.as_deref().and_then(IssueStatus::from_filter),
        search: params.q.filter(|q| !q.trim().is_empty()),
        ..IssueFilter::scoped_to(&user)
    };

    let (issues, total) = service.list(&filter, &pagination, true).await?;
    Ok(Json(ApiResponse::success(
        Some(issues),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

/// Public issue feed
#[utoipa::path(
    get,
    path = "/api/public/issues",
    params(PublicIssueQueryParams),
    responses(
        (status = 200, description = "Issues without reporter details", body = ApiResponse<Vec<IssueDto>>)
    ),
    tag = "public"
)]
pub async fn list_public_issues(
    State(service): State<Arc<IssueService>>,
    Query(params): Query<PublicIssueQueryParams>,
) -> Result<Json<ApiResponse<Vec<IssueDto>>>> {
    let pagination = params.pagination();
    let filter = IssueFilter {
        status: params.status.as_deref().and_then(IssueStatus::from_filter),
        search: params.q.filter(|q| !q.trim().is_empty()),
        sector_name: params
            .sector
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        ..IssueFilter::default()
    };

    let (issues, total) = service.list(&filter, &pagination, false).await?;
    Ok(Json(ApiResponse::success(
        Some(issues),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

/// Weekly submission quota of the caller
#[utoipa::path(
    get,
    path = "/api/issues/quota",
    responses(
        (status = 200, description = "Quota status", body = ApiResponse<QuotaStatusDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "issues",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_quota(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
) -> Result<Json<ApiResponse<QuotaStatusDto>>> {
    let quota = service.quota_status(user.id).await?;
    Ok(Json(ApiResponse::success(Some(quota), None, None)))
}

/// Get an issue
#[utoipa::path(
    get,
    path = "/api/issues/{id}",
    params(
        ("id" = Uuid, Path, description = "Issue ID")
    ),
    responses(
        (status = 200, description = "Issue", body = ApiResponse<IssueDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the reporter or assigned sector"),
        (status = 404, description = "Issue not found")
    ),
    tag = "issues",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_issue(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<IssueDto>>> {
    let issue = service.get_for_user(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(issue), None, None)))
}

/// Move an issue along submitted → inprogress → solved
#[utoipa::path(
    patch,
    path = "/api/issues/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Issue ID")
    ),
    request_body = UpdateIssueStatusDto,
    responses(
        (status = 200, description = "Status updated, or unchanged", body = ApiResponse<IssueDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the assigned sector"),
        (status = 404, description = "Issue not found"),
        (status = 409, description = "Issue was moved by another request"),
        (status = 422, description = "Invalid status or transition")
    ),
    tag = "issues",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_issue_status(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateIssueStatusDto>,
) -> Result<Json<ApiResponse<IssueDto>>> {
    let (issue, changed) = service.update_status(&user, id, &dto.status).await?;
    let message = if changed { "Status updated" } else { "No change" };

    Ok(Json(ApiResponse::success(
        Some(issue),
        Some(message.to_string()),
        None,
    )))
}

#[cfg(test)]
mod tests {
    use crate::core::config::IssueConfig;
    use crate::features::auth::model::UserRole;
    use crate::features::broadcasting::broadcaster::NullBroadcaster;
    use crate::features::issues::routes;
    use crate::features::issues::services::IssueService;
    use crate::shared::test_helpers::{
        insert_user, lazy_pool, offline_storage, test_user, with_user,
    };
    use axum::http::StatusCode;
    use axum::Router;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use sqlx::PgPool;
    use std::sync::Arc;
    use uuid::Uuid;

    fn service_with(pool: PgPool, config: IssueConfig) -> Arc<IssueService> {
        Arc::new(IssueService::new(
            pool,
            Arc::new(offline_storage()),
            Arc::new(NullBroadcaster),
            config,
        ))
    }

    fn service() -> Arc<IssueService> {
        service_with(lazy_pool(), IssueConfig::default())
    }

    fn protected(role: UserRole) -> Router {
        with_user(routes::protected_routes(service()), test_user(role))
    }

    fn invalid_form() -> MultipartForm {
        MultipartForm::new()
            .add_text("description", "   ")
            .add_text("sector_id", "not-a-uuid")
            .add_text("latitude", "91")
            .add_text("longitude", "12.5")
            .add_part(
                "images[]",
                Part::bytes(b"%PDF-1.4".to_vec())
                    .file_name("scan.pdf")
                    .mime_type("application/pdf"),
            )
    }

    #[tokio::test]
    async fn test_sector_cannot_submit() {
        let server = TestServer::new(protected(UserRole::Sector)).unwrap();
        let form = MultipartForm::new().add_text("description", "Broken streetlight");

        server
            .post("/api/issues")
            .multipart(form)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_submission_reports_every_invalid_field(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let app = routes::protected_routes(service_with(pool, IssueConfig::default()));
        let server = TestServer::new(with_user(app, citizen)).unwrap();

        let response = server.post("/api/issues").multipart(invalid_form()).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("description"));
        assert!(message.contains("sector_id"));
        assert!(message.contains("latitude"));
        assert!(!message.contains("longitude"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_over_quota_wins_over_invalid_form(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        sqlx::query(
            r#"
            INSERT INTO issues (id, reporter_id, sector_id, description, latitude, longitude)
            VALUES ($1, $2, $3, 'Pothole on Main St', 1.0, 2.0)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(citizen.id)
        .bind(sector.id)
        .execute(&pool)
        .await
        .unwrap();

        let config = IssueConfig {
            weekly_submission_limit: 1,
            ..IssueConfig::default()
        };
        let app = routes::protected_routes(service_with(pool, config));
        let server = TestServer::new(with_user(app, citizen)).unwrap();

        let response = server.post("/api/issues").multipart(invalid_form()).await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);

        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("(1/1)"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_public_list_tolerates_huge_page(pool: PgPool) {
        let server = TestServer::new(routes::public_routes(service_with(
            pool,
            IssueConfig::default(),
        )))
        .unwrap();

        let response = server
            .get("/api/public/issues")
            .add_query_param("page", i64::MAX)
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["meta"]["total"], json!(0));
    }

    #[tokio::test]
    async fn test_status_update_requires_uuid_and_json() {
        let server = TestServer::new(protected(UserRole::Sector)).unwrap();

        server
            .patch("/api/issues/17/status")
            .json(&json!({"status": "inprogress"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .patch(&format!("/api/issues/{}/status", Uuid::now_v7()))
            .text("status=inprogress")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_requires_identity() {
        let server = TestServer::new(routes::protected_routes(service())).unwrap();

        server
            .get("/api/issues")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/issues/quota")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/issues")
            .multipart(MultipartForm::new().add_text("description", "x"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
