/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Rolling window the weekly submission quota is counted over
pub const SUBMISSION_WINDOW_DAYS: i64 = 7;

/// MIME types accepted for issue photos
pub const ALLOWED_IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

// =============================================================================
// NOTIFICATION TEXT
// =============================================================================

pub const NEW_ISSUE_TITLE: &str = "New Issue Reported";
pub const NEW_ISSUE_MESSAGE: &str = "A new issue was reported in your sector.";
pub const STATUS_UPDATE_TITLE: &str = "Issue Status Updated";
