use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account role matching the `user_role` database enum
///
/// A `sector` account doubles as the identity of a municipal department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Citizen,
    Sector,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Citizen => write!(f, "citizen"),
            UserRole::Sector => write!(f, "sector"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

/// Database model for an account
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity resolved from a bearer token for the duration of a request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// `jti` of the presenting token, used to revoke it on logout
    #[serde(skip)]
    pub token_id: Uuid,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_sector(&self) -> bool {
        self.role == UserRole::Sector
    }

    pub fn is_citizen(&self) -> bool {
        self.role == UserRole::Citizen
    }

    /// Sector staff and admins can triage issues
    pub fn can_triage(&self) -> bool {
        self.is_sector() || self.is_admin()
    }

    /// Citizens and admins can submit issues; sector accounts only receive them
    pub fn can_report(&self) -> bool {
        self.is_citizen() || self.is_admin()
    }
}

/// Column list matching [`User`] for `query_as`
pub const USER_COLUMNS: &str =
    "id, first_name, last_name, name, email, password_hash, role, created_at, updated_at";

/// Display name derived from first and last name
pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name.trim(), last_name.trim())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_trims_parts() {
        assert_eq!(full_name(" Jane ", "Doe"), "Jane Doe");
        assert_eq!(full_name("Roads", ""), "Roads");
        assert_eq!(full_name("", "  "), "");
    }

    #[test]
    fn test_role_capabilities() {
        let mut user = AuthenticatedUser {
            id: Uuid::now_v7(),
            name: "x".into(),
            email: "x@example.com".into(),
            role: UserRole::Citizen,
            token_id: Uuid::now_v7(),
        };
        assert!(user.can_report() && !user.can_triage());

        user.role = UserRole::Sector;
        assert!(!user.can_report() && user.can_triage());

        user.role = UserRole::Admin;
        assert!(user.can_report() && user.can_triage());
    }
}
