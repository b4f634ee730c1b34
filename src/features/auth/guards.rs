//! Role-based authorization guards for the application.
//!
//! These guards extract the authenticated user and verify they have the required role.
//!
//! Roles:
//! - admin: manages users and sectors, may act on any issue
//! - sector: a department account, triages issues assigned to it
//! - citizen: reports issues and tracks their progress

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use axum::{extract::FromRequestParts, http::request::Parts};

fn authenticated(parts: &Parts) -> Result<AuthenticatedUser, AppError> {
    parts
        .extensions
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("User not authenticated".to_string()))
}

/// Guard for admin-only endpoints.
///
/// # Example
/// ```ignore
/// pub async fn handler(RequireAdmin(user): RequireAdmin) { ... }
/// ```
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }
        Ok(RequireAdmin(user))
    }
}

/// Guard for issue triage (sector accounts and admins).
///
/// Whether a sector may act on a particular issue is decided by the service,
/// which knows the issue's assignment.
pub struct RequireTriage(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireTriage
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.can_triage() {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }
        Ok(RequireTriage(user))
    }
}

/// Guard for issue submission (citizens and admins).
pub struct RequireReporter(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireReporter
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.can_report() {
            return Err(AppError::Forbidden(
                "Sector accounts cannot submit issues".to_string(),
            ));
        }
        Ok(RequireReporter(user))
    }
}
