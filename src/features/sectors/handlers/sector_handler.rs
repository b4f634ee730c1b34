use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireAdmin;
use crate::features::sectors::dtos::{
    CreateSectorDto, PublicSectorDto, SectorDto, UpdateSectorDto,
};
use crate::features::sectors::services::SectorService;
use crate::shared::types::{ApiResponse, Meta};

/// List sector accounts
#[utoipa::path(
    get,
    path = "/api/sectors",
    responses(
        (status = 200, description = "Sectors ordered by name", body = ApiResponse<Vec<SectorDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin access required")
    ),
    tag = "sectors",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_sectors(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<SectorService>>,
) -> Result<Json<ApiResponse<Vec<SectorDto>>>> {
    let sectors = service.list().await?;
    let total = sectors.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(sectors),
        None,
        Some(Meta::total(total)),
    )))
}

/// Create a sector account
///
/// The login email is derived from the name, e.g. "Public Works" becomes
/// `public-works@{domain}` (or `public-works-2@...` when taken).
#[utoipa::path(
    post,
    path = "/api/sectors",
    request_body = CreateSectorDto,
    responses(
        (status = 201, description = "Sector created", body = ApiResponse<SectorDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin access required"),
        (status = 422, description = "Validation error")
    ),
    tag = "sectors",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_sector(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<SectorService>>,
    AppJson(dto): AppJson<CreateSectorDto>,
) -> Result<(StatusCode, Json<ApiResponse<SectorDto>>)> {
    dto.validate().map_err(AppError::from_validation)?;

    let sector = service.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(sector),
            Some("Sector created".to_string()),
            None,
        )),
    ))
}

#[utoipa::path(
    put,
    path = "/api/sectors/{id}",
    params(
        ("id" = Uuid, Path, description = "Sector ID")
    ),
    request_body = UpdateSectorDto,
    responses(
        (status = 200, description = "Sector updated", body = ApiResponse<SectorDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin access required"),
        (status = 404, description = "Sector not found"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error")
    ),
    tag = "sectors",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_sector(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<SectorService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateSectorDto>,
) -> Result<Json<ApiResponse<SectorDto>>> {
    dto.validate().map_err(AppError::from_validation)?;

    let sector = service.update(id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(sector),
        Some("Sector updated".to_string()),
        None,
    )))
}

/// Delete a sector together with the issues assigned to it
#[utoipa::path(
    delete,
    path = "/api/sectors/{id}",
    params(
        ("id" = Uuid, Path, description = "Sector ID")
    ),
    responses(
        (status = 200, description = "Sector deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin access required"),
        (status = 404, description = "Sector not found")
    ),
    tag = "sectors",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_sector(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<SectorService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Sector deleted".to_string()),
        None,
    )))
}

/// Sectors a report can be addressed to
#[utoipa::path(
    get,
    path = "/api/public/sectors",
    responses(
        (status = 200, description = "Sectors ordered by name", body = ApiResponse<Vec<PublicSectorDto>>)
    ),
    tag = "public"
)]
pub async fn list_public_sectors(
    State(service): State<Arc<SectorService>>,
) -> Result<Json<ApiResponse<Vec<PublicSectorDto>>>> {
    let sectors = service.list_public().await?;
    Ok(Json(ApiResponse::success(Some(sectors), None, None)))
}
