use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::notifications::dtos::NotificationDto;
use crate::features::notifications::models::{
    NewNotification, Notification, NOTIFICATION_COLUMNS,
};

/// Reads and read-state changes for a user's own notifications
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a notification on the caller's connection
    ///
    /// Takes a connection rather than the pool so the row commits or rolls
    /// back with the issue change it describes.
    pub async fn insert(conn: &mut PgConnection, new: &NewNotification) -> Result<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (id, user_id, title, message, type, issue_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.kind)
        .bind(new.issue_id)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create notification: {:?}", e);
            AppError::Database(e)
        })
    }

    /// Newest first
    pub async fn list(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<NotificationDto>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list notifications: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(notifications.into_iter().map(NotificationDto::from).collect())
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count unread notifications: {:?}", e);
            AppError::Database(e)
        })
    }

    /// Mark one notification read; an already read one keeps its `read_at`
    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<NotificationDto> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET is_read = TRUE,
                read_at = COALESCE(read_at, NOW()),
                updated_at = CASE WHEN is_read THEN updated_at ELSE NOW() END
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to mark notification read: {:?}", e);
            AppError::Database(e)
        })?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        Ok(notification.into())
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to mark notifications read: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::UserRole;
    use crate::features::notifications::models::NotificationType;
    use crate::shared::test_helpers::insert_user;

    /// Issue from a fresh citizen to a fresh sector, with one notification
    /// for the sector
    async fn seed(pool: &PgPool) -> (Uuid, Notification) {
        let citizen = insert_user(pool, UserRole::Citizen).await;
        let sector = insert_user(pool, UserRole::Sector).await;
        let issue_id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO issues (id, reporter_id, sector_id, description, latitude, longitude)
            VALUES ($1, $2, $3, 'Overflowing bins', 0.0, 0.0)
            "#,
        )
        .bind(issue_id)
        .bind(citizen.id)
        .bind(sector.id)
        .execute(pool)
        .await
        .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let notification = NotificationService::insert(
            &mut *conn,
            &NewNotification {
                user_id: sector.id,
                title: "New Issue Reported".to_string(),
                message: "A new issue was reported in your sector.".to_string(),
                kind: NotificationType::NewIssue,
                issue_id,
            },
        )
        .await
        .unwrap();

        (sector.id, notification)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_mark_read_keeps_first_read_at(pool: PgPool) {
        let (sector_id, notification) = seed(&pool).await;
        let service = NotificationService::new(pool.clone());
        assert!(!notification.is_read);
        assert_eq!(service.unread_count(sector_id).await.unwrap(), 1);

        let first = service.mark_read(sector_id, notification.id).await.unwrap();
        assert!(first.is_read);
        let read_at = first.read_at.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let second = service.mark_read(sector_id, notification.id).await.unwrap();
        assert_eq!(second.read_at, Some(read_at));
        assert_eq!(second.updated_at, first.updated_at);
        assert_eq!(service.unread_count(sector_id).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_mark_read_is_scoped_to_owner(pool: PgPool) {
        let (_, notification) = seed(&pool).await;
        let stranger = insert_user(&pool, UserRole::Citizen).await;
        let service = NotificationService::new(pool);

        let result = service.mark_read(stranger.id, notification.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_mark_all_read_counts_only_unread(pool: PgPool) {
        let (sector_id, notification) = seed(&pool).await;
        let service = NotificationService::new(pool);

        assert_eq!(service.list(sector_id, true).await.unwrap().len(), 1);
        assert_eq!(service.mark_all_read(sector_id).await.unwrap(), 1);
        assert_eq!(service.mark_all_read(sector_id).await.unwrap(), 0);

        let all = service.list(sector_id, false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, notification.id);
        assert!(service.list(sector_id, true).await.unwrap().is_empty());
    }
}
