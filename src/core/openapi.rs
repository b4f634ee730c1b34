use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth::{self, dtos as auth_dtos};
use crate::features::broadcasting::{dtos as broadcasting_dtos, handlers as broadcasting_handlers};
use crate::features::issues::{
    dtos as issues_dtos, handlers as issues_handlers, models as issues_models,
};
use crate::features::notifications::{
    dtos as notifications_dtos, handlers as notifications_handlers,
    models as notifications_models,
};
use crate::features::sectors::{dtos as sectors_dtos, handlers as sectors_handlers};
use crate::features::users::{dtos as users_dtos, handlers as users_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth::handlers::register,
        auth::handlers::login,
        auth::handlers::logout,
        auth::handlers::get_me,
        auth::handlers::update_me,
        // Issues
        issues_handlers::create_issue,
        issues_handlers::list_issues,
        issues_handlers::get_quota,
        issues_handlers::get_issue,
        issues_handlers::update_issue_status,
        // Notifications
        notifications_handlers::list_notifications,
        notifications_handlers::unread_count,
        notifications_handlers::mark_read,
        notifications_handlers::mark_all_read,
        // Broadcasting
        broadcasting_handlers::authorize_channel,
        // Sectors (admin)
        sectors_handlers::list_sectors,
        sectors_handlers::create_sector,
        sectors_handlers::update_sector,
        sectors_handlers::delete_sector,
        // Users (admin)
        users_handlers::list_users,
        users_handlers::update_user,
        // Public
        issues_handlers::list_public_issues,
        sectors_handlers::list_public_sectors,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Auth
            auth::model::UserRole,
            auth_dtos::RegisterRequestDto,
            auth_dtos::LoginRequestDto,
            auth_dtos::UpdateProfileDto,
            auth_dtos::UserDto,
            auth_dtos::AuthResponseDto,
            auth_dtos::MeResponseDto,
            ApiResponse<auth_dtos::AuthResponseDto>,
            ApiResponse<auth_dtos::MeResponseDto>,
            ApiResponse<auth_dtos::UserDto>,
            // Issues
            issues_models::IssueStatus,
            issues_dtos::CreateIssueForm,
            issues_dtos::UpdateIssueStatusDto,
            issues_dtos::UserSummaryDto,
            issues_dtos::IssueImageDto,
            issues_dtos::IssueDto,
            issues_dtos::QuotaStatusDto,
            ApiResponse<issues_dtos::IssueDto>,
            ApiResponse<Vec<issues_dtos::IssueDto>>,
            ApiResponse<issues_dtos::QuotaStatusDto>,
            // Notifications
            notifications_models::NotificationType,
            notifications_dtos::NotificationDto,
            notifications_dtos::UnreadCountDto,
            notifications_dtos::MarkAllReadDto,
            ApiResponse<notifications_dtos::NotificationDto>,
            ApiResponse<Vec<notifications_dtos::NotificationDto>>,
            ApiResponse<notifications_dtos::UnreadCountDto>,
            ApiResponse<notifications_dtos::MarkAllReadDto>,
            // Broadcasting
            broadcasting_dtos::ChannelAuthRequestDto,
            broadcasting_dtos::ChannelAuthResponseDto,
            // Sectors
            sectors_dtos::CreateSectorDto,
            sectors_dtos::UpdateSectorDto,
            sectors_dtos::SectorDto,
            sectors_dtos::PublicSectorDto,
            ApiResponse<sectors_dtos::SectorDto>,
            ApiResponse<Vec<sectors_dtos::SectorDto>>,
            ApiResponse<Vec<sectors_dtos::PublicSectorDto>>,
            // Users
            users_dtos::AdminUpdateUserDto,
            ApiResponse<Vec<auth_dtos::UserDto>>,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and the current account"),
        (name = "issues", description = "Issue submission and triage"),
        (name = "notifications", description = "Persisted notifications of the current account"),
        (name = "broadcasting", description = "Private channel authorization for the realtime relay"),
        (name = "sectors", description = "Sector accounts (admin only)"),
        (name = "users", description = "Account administration (admin only)"),
        (name = "public", description = "Unauthenticated issue feed and sector list"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Civic Report API",
        version = "0.1.0",
        description = "Municipal issue reporting API",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/auth/login",
            "/api/issues",
            "/api/issues/{id}/status",
            "/api/notifications/{id}/read",
            "/broadcasting/auth",
            "/api/sectors/{id}",
            "/api/public/issues",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
