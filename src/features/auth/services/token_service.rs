use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::core::config::AuthConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, UserRole};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: Uuid,
    /// Token id, the primary key of its `access_tokens` row
    pub jti: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_id: Uuid,
    pub expires_in: i64,
}

#[derive(Debug, FromRow)]
struct SessionUserRow {
    id: Uuid,
    name: String,
    email: String,
    role: UserRole,
}

/// Issues, validates and revokes access tokens
///
/// Tokens are HS256 JWTs whose `jti` must still exist in `access_tokens`,
/// so logging out (deleting the row) revokes a token before it expires.
pub struct TokenService {
    pool: PgPool,
    issuer: String,
    ttl_secs: i64,
    leeway_secs: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(pool: PgPool, config: &AuthConfig) -> Self {
        Self {
            pool,
            issuer: config.issuer.clone(),
            ttl_secs: config.access_token_ttl.as_secs() as i64,
            leeway_secs: config.jwt_leeway.as_secs(),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// Sign claims for a new token without persisting it
    fn sign(&self, user_id: Uuid, token_id: Uuid) -> Result<(String, chrono::DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(self.ttl_secs);
        let claims = AccessClaims {
            sub: user_id,
            jti: token_id,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))?;

        Ok((token, expires_at))
    }

    /// Verify signature, issuer and expiry of a token
    pub fn decode_claims(&self, token: &str) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = self.leeway_secs;

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Auth(format!("Invalid access token: {}", e)))
    }

    /// Issue and persist a new token for the user
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedToken> {
        let token_id = Uuid::now_v7();
        let (access_token, expires_at) = self.sign(user_id, token_id)?;

        sqlx::query(
            r#"
            INSERT INTO access_tokens (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_id)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store access token: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::debug!("Issued access token {} for user {}", token_id, user_id);

        Ok(IssuedToken {
            access_token,
            token_id,
            expires_in: self.ttl_secs,
        })
    }

    /// Resolve a bearer token to the current state of its user
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser> {
        let claims = self.decode_claims(token)?;

        let row = sqlx::query_as::<_, SessionUserRow>(
            r#"
            WITH touched AS (
                UPDATE access_tokens
                SET last_used_at = NOW()
                WHERE id = $1 AND user_id = $2 AND expires_at > NOW()
                RETURNING user_id
            )
            SELECT u.id, u.name, u.email, u.role
            FROM users u
            JOIN touched t ON t.user_id = u.id
            "#,
        )
        .bind(claims.jti)
        .bind(claims.sub)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up access token: {:?}", e);
            AppError::Database(e)
        })?
        .ok_or_else(|| AppError::Auth("Access token has been revoked".to_string()))?;

        Ok(AuthenticatedUser {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            token_id: claims.jti,
        })
    }

    /// Revoke a single token
    pub async fn revoke(&self, token_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM access_tokens WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to revoke access token: {:?}", e);
                AppError::Database(e)
            })?;

        tracing::debug!("Revoked access token {}", token_id);
        Ok(())
    }
}
