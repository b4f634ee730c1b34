use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata of a stored issue photo; the bytes live in object storage under `path`
#[derive(Debug, Clone, FromRow)]
pub struct IssueImage {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub path: String,
    pub original_name: Option<String>,
    pub size: Option<i64>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const ISSUE_IMAGE_COLUMNS: &str =
    "id, issue_id, path, original_name, size, mime_type, created_at";
