use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::core::config::IssueConfig;
use crate::core::error::{AppError, Result};
use crate::features::issues::models::IssueStatus;
use crate::shared::constants::{ALLOWED_IMAGE_MIME_TYPES, DEFAULT_PAGE_SIZE};
use crate::shared::types::PaginationQuery;

// =============================================================================
// REQUESTS
// =============================================================================

/// Multipart form for submitting an issue (documentation only, parsed by hand)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreateIssueForm {
    pub description: String,
    /// Id of a sector account
    pub sector_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    /// Up to 5 photos (jpeg, png or webp, 10MB each), sent as `images` or `images[]`
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
}

/// A photo as received in the multipart body
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Normalized MIME type, falling back to the file extension when the
    /// client sent none or a generic one
    pub fn mime_type(&self) -> Option<&'static str> {
        let declared = self
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase());

        let from_declared = declared.as_deref().and_then(|ct| match ct {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("image/jpeg"),
            "image/png" => Some("image/png"),
            "image/webp" => Some("image/webp"),
            _ => None,
        });
        if from_declared.is_some() {
            return from_declared;
        }

        let generic = declared
            .as_deref()
            .is_none_or(|ct| ct == "application/octet-stream");
        if !generic {
            return None;
        }

        let extension = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase())?;
        match extension.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "webp" => Some("image/webp"),
            _ => None,
        }
    }
}

/// Raw multipart fields before validation
#[derive(Debug, Default)]
pub struct NewIssueForm {
    pub description: Option<String>,
    pub sector_id: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub images: Vec<ImageUpload>,
}

/// A photo that passed validation
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub original_name: Option<String>,
    pub mime_type: &'static str,
    pub extension: &'static str,
    pub data: Vec<u8>,
}

/// A validated issue submission
#[derive(Debug, Clone)]
pub struct NewIssueInput {
    pub description: String,
    pub sector_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub images: Vec<ValidImage>,
}

impl NewIssueForm {
    /// Validate every field, reporting all problems at once
    pub fn validate(self, config: &IssueConfig) -> Result<NewIssueInput> {
        let mut errors = Vec::new();

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if description.is_none() {
            errors.push("The description field is required".to_string());
        }

        let sector_id = match self.sector_id.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("The sector_id field is required".to_string());
                None
            }
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("The selected sector_id is invalid".to_string());
                    None
                }
            },
        };

        let latitude = parse_coordinate("latitude", self.latitude.as_deref(), 90.0, &mut errors);
        let longitude =
            parse_coordinate("longitude", self.longitude.as_deref(), 180.0, &mut errors);

        if self.images.len() > config.max_images {
            errors.push(format!(
                "No more than {} images may be uploaded",
                config.max_images
            ));
        }

        let mut images = Vec::with_capacity(self.images.len());
        for (index, image) in self.images.into_iter().enumerate() {
            if image.data.len() > config.max_image_size {
                errors.push(format!(
                    "Image {} is larger than {} MB",
                    index + 1,
                    config.max_image_size / 1024 / 1024
                ));
                continue;
            }
            match image.mime_type() {
                Some(mime_type) => images.push(ValidImage {
                    original_name: image.file_name,
                    mime_type,
                    extension: extension_for(mime_type),
                    data: image.data,
                }),
                None => errors.push(format!(
                    "Image {} must be one of: {}",
                    index + 1,
                    ALLOWED_IMAGE_MIME_TYPES.join(", ")
                )),
            }
        }

        match (description, sector_id, latitude, longitude) {
            (Some(description), Some(sector_id), Some(latitude), Some(longitude))
                if errors.is_empty() =>
            {
                Ok(NewIssueInput {
                    description,
                    sector_id,
                    latitude,
                    longitude,
                    images,
                })
            }
            _ => Err(AppError::Validation(errors.join("; "))),
        }
    }
}

fn parse_coordinate(
    field: &str,
    raw: Option<&str>,
    bound: f64,
    errors: &mut Vec<String>,
) -> Option<f64> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        errors.push(format!("The {} field is required", field));
        return None;
    };

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && (-bound..=bound).contains(&value) => Some(value),
        Ok(_) => {
            errors.push(format!("The {} must be between -{} and {}", field, bound, bound));
            None
        }
        Err(_) => {
            errors.push(format!("The {} must be a number", field));
            None
        }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateIssueStatusDto {
    /// One of submitted, inprogress, solved
    pub status: String,
}

/// Filters for the authenticated issue list
#[derive(Debug, Deserialize, IntoParams)]
pub struct IssueQueryParams {
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,
    /// Status, UI aliases accepted (open, progress, resolved)
    pub status: Option<String>,
    /// Case-insensitive search in the description
    pub q: Option<String>,
}

/// Filters for the public issue feed
#[derive(Debug, Deserialize, IntoParams)]
pub struct PublicIssueQueryParams {
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,
    pub q: Option<String>,
    /// Exact sector name
    pub sector: Option<String>,
    pub status: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl IssueQueryParams {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

impl PublicIssueQueryParams {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummaryDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueImageDto {
    pub id: Uuid,
    pub path: String,
    pub url: String,
    pub original_name: Option<String>,
    pub size: Option<i64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueDto {
    pub id: Uuid,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: IssueStatus,
    /// Omitted from the public feed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<UserSummaryDto>,
    pub sector: UserSummaryDto,
    pub images: Vec<IssueImageDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Weekly submission quota of the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaStatusDto {
    /// `None` when the quota is disabled
    pub limit: Option<i64>,
    pub used: i64,
    pub remaining: Option<i64>,
    pub can_submit: bool,
    /// When the oldest counted submission leaves the 7-day window
    pub resets_at: Option<DateTime<Utc>>,
}
