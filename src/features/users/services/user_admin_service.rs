use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{map_unique_violation, AppError, Result};
use crate::features::auth::dtos::UserDto;
use crate::features::auth::model::{User, UserRole, USER_COLUMNS};
use crate::features::users::dtos::AdminUpdateUserDto;
use crate::shared::types::PaginationQuery;
use crate::shared::validation::{contains_pattern, non_blank, normalize_email};

/// Account administration across all roles
pub struct UserAdminService {
    pool: PgPool,
}

impl UserAdminService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Page of users ordered by name, with the total matching count
    pub async fn list(
        &self,
        role: Option<UserRole>,
        search: Option<&str>,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<UserDto>, i64)> {
        let pattern = non_blank(search).map(|s| contains_pattern(&s));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2)
            "#,
        )
        .bind(role)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count users: {:?}", e);
            AppError::Database(e)
        })?;

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2)
            ORDER BY name, id
            LIMIT $3 OFFSET $4
            "#,
            USER_COLUMNS
        ))
        .bind(role)
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::Database(e)
        })?;

        Ok((users.into_iter().map(UserDto::from).collect(), total))
    }

    /// Change role, name or email of any account
    ///
    /// A new name replaces first and last name as a whole.
    pub async fn update(&self, id: Uuid, dto: AdminUpdateUserDto) -> Result<UserDto> {
        let name = non_blank(dto.name.as_deref());
        let email = dto.email.map(|e| normalize_email(&e));

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($2, role),
                first_name = COALESCE($3, first_name),
                last_name = CASE WHEN $3::text IS NULL THEN last_name ELSE '' END,
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(dto.role)
        .bind(&name)
        .bind(&email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Email already registered"))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!("Admin updated user {} (role {})", user.id, user.role);
        Ok(user.into())
    }
}
