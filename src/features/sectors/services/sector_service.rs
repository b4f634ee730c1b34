use std::collections::HashSet;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::config::AccountConfig;
use crate::core::error::{map_unique_violation, AppError, Result};
use crate::features::auth::model::{User, UserRole, USER_COLUMNS};
use crate::features::auth::password::hash_password_blocking;
use crate::features::sectors::dtos::{
    CreateSectorDto, PublicSectorDto, SectorDto, UpdateSectorDto,
};
use crate::modules::storage::MinIOClient;
use crate::shared::validation::{non_blank, normalize_email, slugify};

const DUPLICATE_EMAIL: &str = "Email already registered";

/// Admin management of sector accounts
pub struct SectorService {
    pool: PgPool,
    storage: Arc<MinIOClient>,
    accounts: AccountConfig,
}

impl SectorService {
    pub fn new(pool: PgPool, storage: Arc<MinIOClient>, accounts: AccountConfig) -> Self {
        Self {
            pool,
            storage,
            accounts,
        }
    }

    pub async fn list(&self) -> Result<Vec<SectorDto>> {
        let sectors = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY name, id",
            USER_COLUMNS
        ))
        .bind(UserRole::Sector)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list sectors: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(sectors.into_iter().map(SectorDto::from).collect())
    }

    pub async fn list_public(&self) -> Result<Vec<PublicSectorDto>> {
        sqlx::query_as::<_, PublicSectorDto>(
            "SELECT id, name FROM users WHERE role = $1 ORDER BY name, id",
        )
        .bind(UserRole::Sector)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list public sectors: {:?}", e);
            AppError::Database(e)
        })
    }

    /// Create a sector account with a generated login email
    pub async fn create(&self, dto: CreateSectorDto) -> Result<SectorDto> {
        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }

        let email = self.available_email(&name).await?;
        let password = dto
            .password
            .unwrap_or_else(|| self.accounts.sector_default_password.clone());
        let password_hash = hash_password_blocking(password).await?;

        let sector = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, name, email, password_hash, role)
            VALUES ($1, $2, '', $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(UserRole::Sector)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_EMAIL))?;

        tracing::info!("Created sector {} ({})", sector.id, sector.email);
        Ok(sector.into())
    }

    /// Rename a sector or change its login email
    pub async fn update(&self, id: Uuid, dto: UpdateSectorDto) -> Result<SectorDto> {
        let current = self.find_sector(id).await?;

        let name = non_blank(dto.name.as_deref()).unwrap_or(current.name);
        let email = dto
            .email
            .map(|e| normalize_email(&e))
            .unwrap_or(current.email);

        let sector = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $2, name = $2, email = $3, updated_at = NOW()
            WHERE id = $1 AND role = $4
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&name)
        .bind(&email)
        .bind(UserRole::Sector)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_EMAIL))?
        .ok_or_else(sector_not_found)?;

        tracing::info!("Updated sector {}", sector.id);
        Ok(sector.into())
    }

    /// Delete a sector with its issues, images and notifications
    ///
    /// Rows go through the cascading foreign keys; the photo blobs of the
    /// removed issues are deleted from storage afterwards.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin transaction: {:?}", e);
            AppError::Database(e)
        })?;

        let image_paths: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT ii.path
            FROM issue_images ii
            JOIN issues i ON i.id = ii.issue_id
            WHERE i.sector_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to collect sector images: {:?}", e);
            AppError::Database(e)
        })?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1 AND role = $2")
            .bind(id)
            .bind(UserRole::Sector)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete sector: {:?}", e);
                AppError::Database(e)
            })?;

        if deleted.rows_affected() == 0 {
            return Err(sector_not_found());
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit sector deletion: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::info!(
            "Deleted sector {} and {} stored images",
            id,
            image_paths.len()
        );
        self.storage.delete_best_effort(&image_paths).await;

        Ok(())
    }

    async fn find_sector(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND role = $2",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(UserRole::Sector)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch sector: {:?}", e);
            AppError::Database(e)
        })?
        .ok_or_else(sector_not_found)
    }

    /// First free `slug@domain`, `slug-2@domain`, ... for a sector name
    async fn available_email(&self, name: &str) -> Result<String> {
        let slug = sector_slug(name);
        let domain = self.accounts.sector_email_domain.to_lowercase();
        let pattern = format!("{}%@{}", slug, escape_like(&domain));

        let taken: HashSet<String> =
            sqlx::query_scalar("SELECT LOWER(email) FROM users WHERE LOWER(email) LIKE $1")
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to look up sector emails: {:?}", e);
                    AppError::Database(e)
                })?
                .into_iter()
                .collect();

        Ok(first_free_email(&slug, &domain, &taken))
    }
}

fn sector_not_found() -> AppError {
    AppError::NotFound("Sector not found".to_string())
}

fn sector_slug(name: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        "sector".to_string()
    } else {
        slug
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn first_free_email(slug: &str, domain: &str, taken: &HashSet<String>) -> String {
    let base = format!("{}@{}", slug, domain);
    if !taken.contains(&base) {
        return base;
    }

    (2..)
        .map(|n| format!("{}-{}@{}", slug, n, domain))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::notifications::models::NotificationType;
    use crate::shared::test_helpers::{insert_user, offline_storage};

    async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
        sqlx::query_scalar(sql).bind(id).fetch_one(pool).await.unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_removes_issues_images_and_notifications(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let issue_id = Uuid::now_v7();

        sqlx::query(
            r#"
            INSERT INTO issues (id, reporter_id, sector_id, description, latitude, longitude)
            VALUES ($1, $2, $3, 'Broken bench in the park', 10.0, 20.0)
            "#,
        )
        .bind(issue_id)
        .bind(citizen.id)
        .bind(sector.id)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            INSERT INTO issue_images (id, issue_id, path, original_name, size, mime_type)
            VALUES ($1, $2, 'public/issues/x/y.jpg', 'bench.jpg', 3, 'image/jpeg')
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(issue_id)
        .execute(&pool)
        .await
        .unwrap();
        let notified = [
            (sector.id, NotificationType::NewIssue),
            (citizen.id, NotificationType::StatusUpdate),
        ];
        for (user_id, kind) in notified {
            sqlx::query(
                r#"
                INSERT INTO notifications (id, user_id, title, message, type, issue_id)
                VALUES ($1, $2, 'Title', 'Message', $3, $4)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(user_id)
            .bind(kind)
            .bind(issue_id)
            .execute(&pool)
            .await
            .unwrap();
        }

        let service = SectorService::new(
            pool.clone(),
            Arc::new(offline_storage()),
            AccountConfig::default(),
        );
        service.delete(sector.id).await.unwrap();

        let by_issue = [
            "SELECT COUNT(*) FROM issues WHERE id = $1",
            "SELECT COUNT(*) FROM issue_images WHERE issue_id = $1",
            "SELECT COUNT(*) FROM notifications WHERE issue_id = $1",
        ];
        for sql in by_issue {
            assert_eq!(count(&pool, sql, issue_id).await, 0, "{}", sql);
        }
        assert_eq!(
            count(&pool, "SELECT COUNT(*) FROM users WHERE id = $1", citizen.id).await,
            1
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_refuses_non_sector_accounts(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let service = SectorService::new(
            pool.clone(),
            Arc::new(offline_storage()),
            AccountConfig::default(),
        );

        let result = service.delete(citizen.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(
            count(&pool, "SELECT COUNT(*) FROM users WHERE id = $1", citizen.id).await,
            1
        );
    }

    fn taken(emails: &[&str]) -> HashSet<String> {
        emails.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_first_free_email() {
        assert_eq!(
            first_free_email("public-works", "report.com", &taken(&[])),
            "public-works@report.com"
        );
        assert_eq!(
            first_free_email(
                "public-works",
                "report.com",
                &taken(&["public-works@report.com", "public-works-2@report.com"])
            ),
            "public-works-3@report.com"
        );
        // Gaps are reused
        assert_eq!(
            first_free_email(
                "roads",
                "report.com",
                &taken(&["roads@report.com", "roads-3@report.com"])
            ),
            "roads-2@report.com"
        );
    }

    #[test]
    fn test_sector_slug_falls_back_for_symbols() {
        assert_eq!(sector_slug("Water & Sewage"), "water-sewage");
        assert_eq!(sector_slug("***"), "sector");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("my_city.gov"), "my\\_city.gov");
        assert_eq!(escape_like("100%"), "100\\%");
    }
}
