use crate::core::error::{map_unique_violation, AppError, Result};
use crate::features::auth::dtos::{
    AuthResponseDto, LoginRequestDto, MeResponseDto, RegisterRequestDto, UpdateProfileDto,
    UserDto,
};
use crate::features::auth::model::{full_name, AuthenticatedUser, User, UserRole, USER_COLUMNS};
use crate::features::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::features::auth::services::token_service::{IssuedToken, TokenService};
use crate::features::broadcasting::Channel;
use crate::shared::validation::normalize_email;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Service for local account operations (register, login, profile)
pub struct AuthService {
    pool: PgPool,
    token_service: Arc<TokenService>,
}

impl AuthService {
    pub fn new(pool: PgPool, token_service: Arc<TokenService>) -> Self {
        Self {
            pool,
            token_service,
        }
    }

    /// Register a new citizen account and sign it in
    pub async fn register(&self, dto: RegisterRequestDto) -> Result<AuthResponseDto> {
        let first_name = dto.first_name.trim().to_string();
        let last_name = dto.last_name.trim().to_string();
        let name = full_name(&first_name, &last_name);
        let email = normalize_email(&dto.email);
        let password_hash = hash_password_blocking(dto.password).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(&first_name)
        .bind(&last_name)
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(UserRole::Citizen)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Email already registered"))?;

        tracing::info!("Registered citizen {} ({})", user.id, user.email);

        let token = self.token_service.issue(user.id).await?;
        Ok(auth_response(token, user))
    }

    /// Login with email and password
    ///
    /// Unknown emails and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, dto: LoginRequestDto) -> Result<AuthResponseDto> {
        let user = self
            .find_by_email(&normalize_email(&dto.email))
            .await?
            .ok_or_else(invalid_credentials)?;

        let valid = verify_password_blocking(dto.password, user.password_hash.clone()).await?;
        if !valid {
            return Err(invalid_credentials());
        }

        let token = self.token_service.issue(user.id).await?;
        tracing::debug!("User {} logged in with token {}", user.id, token.token_id);
        Ok(auth_response(token, user))
    }

    /// Revoke the token the request was made with
    pub async fn logout(&self, user: &AuthenticatedUser) -> Result<()> {
        self.token_service.revoke(user.token_id).await
    }

    pub async fn get_current_user(&self, user: &AuthenticatedUser) -> Result<MeResponseDto> {
        let record = self.find_by_id(user.id).await?;
        let channel = Channel::for_identity(record.id, record.role).to_string();

        Ok(MeResponseDto {
            user: record.into(),
            channel,
        })
    }

    /// Partial profile update; `name` follows first/last name changes
    pub async fn update_profile(
        &self,
        user: &AuthenticatedUser,
        dto: UpdateProfileDto,
    ) -> Result<UserDto> {
        let current = self.find_by_id(user.id).await?;

        let first_name = dto
            .first_name
            .map(|s| s.trim().to_string())
            .unwrap_or(current.first_name);
        let last_name = dto
            .last_name
            .map(|s| s.trim().to_string())
            .unwrap_or(current.last_name);
        let name = full_name(&first_name, &last_name);
        if name.is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        let email = dto
            .email
            .map(|e| normalize_email(&e))
            .unwrap_or(current.email);
        let password_hash = match dto.password {
            Some(password) => hash_password_blocking(password).await?,
            None => current.password_hash,
        };

        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, name = $4, email = $5,
                password_hash = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&first_name)
        .bind(&last_name)
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Email already registered"))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!("User {} updated their profile", updated.id);
        Ok(updated.into())
    }

    /// Create the bootstrap admin, or promote an existing account with that email
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<()> {
        let email = normalize_email(email);
        let password_hash = hash_password_blocking(password.to_string()).await?;

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (id, first_name, last_name, name, email, password_hash, role)
            VALUES ($1, 'Admin', '', 'Admin', $2, $3, 'admin')
            ON CONFLICT ((LOWER(email)))
            DO UPDATE SET role = 'admin', updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to ensure admin account: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::info!("Admin account {} ready ({})", id, email);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch user: {:?}", e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch user by email: {:?}", e);
            AppError::Database(e)
        })
    }
}

fn invalid_credentials() -> AppError {
    AppError::Validation("Invalid credentials".to_string())
}

fn auth_response(token: IssuedToken, user: User) -> AuthResponseDto {
    AuthResponseDto {
        access_token: token.access_token,
        token_type: "Bearer".to_string(),
        expires_in: token.expires_in,
        user: user.into(),
    }
}
