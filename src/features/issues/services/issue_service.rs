use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::core::config::IssueConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::broadcasting::broadcaster::{NEW_ISSUE_EVENT, STATUS_UPDATED_EVENT};
use crate::features::broadcasting::{broadcast_best_effort, BroadcastEvent, Broadcaster, Channel};
use crate::features::issues::dtos::{
    IssueDto, IssueImageDto, NewIssueInput, QuotaStatusDto, UserSummaryDto,
};
use crate::features::issues::models::{
    Issue, IssueImage, IssueStatus, ISSUE_COLUMNS, ISSUE_IMAGE_COLUMNS,
};
use crate::features::issues::policy::{self, Transition};
use crate::features::notifications::dtos::NotificationDto;
use crate::features::notifications::models::{NewNotification, Notification, NotificationType};
use crate::features::notifications::NotificationService;
use crate::modules::storage::MinIOClient;
use crate::shared::constants::{NEW_ISSUE_MESSAGE, NEW_ISSUE_TITLE, STATUS_UPDATE_TITLE};
use crate::shared::types::PaginationQuery;
use crate::shared::validation::contains_pattern;

/// Issue joined with its reporter and sector
#[derive(Debug, FromRow)]
struct IssueRow {
    id: Uuid,
    reporter_id: Uuid,
    sector_id: Uuid,
    description: String,
    latitude: f64,
    longitude: f64,
    status: IssueStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    reporter_name: String,
    reporter_email: String,
    sector_name: String,
    sector_email: String,
}

const ISSUE_ROW_SELECT: &str = r#"
    SELECT i.id, i.reporter_id, i.sector_id, i.description, i.latitude, i.longitude,
           i.status, i.created_at, i.updated_at,
           r.name AS reporter_name, r.email AS reporter_email,
           s.name AS sector_name, s.email AS sector_email
    FROM issues i
    JOIN users r ON r.id = i.reporter_id
    JOIN users s ON s.id = i.sector_id
"#;

/// A photo already in storage, waiting for its metadata row
#[derive(Debug)]
struct StoredImage {
    id: Uuid,
    key: String,
    original_name: Option<String>,
    size: i64,
    mime_type: &'static str,
}

/// Filter shared by the listing queries; `None` fields do not filter
#[derive(Debug, Default, Clone)]
pub struct IssueFilter {
    pub sector_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub status: Option<IssueStatus>,
    pub search: Option<String>,
    pub sector_name: Option<String>,
}

impl IssueFilter {
    /// Issues visible to `user` in their own list
    pub fn scoped_to(user: &AuthenticatedUser) -> Self {
        if user.is_admin() {
            Self::default()
        } else if user.is_sector() {
            Self {
                sector_id: Some(user.id),
                ..Self::default()
            }
        } else {
            Self {
                reporter_id: Some(user.id),
                ..Self::default()
            }
        }
    }
}

const FILTER_WHERE: &str = r#"
    WHERE ($1::uuid IS NULL OR i.sector_id = $1)
      AND ($2::uuid IS NULL OR i.reporter_id = $2)
      AND ($3::issue_status IS NULL OR i.status = $3)
      AND ($4::text IS NULL OR i.description ILIKE $4)
      AND ($5::text IS NULL OR s.name = $5)
"#;

/// Issue submission, triage and listing
pub struct IssueService {
    pool: PgPool,
    storage: Arc<MinIOClient>,
    broadcaster: Arc<dyn Broadcaster>,
    config: IssueConfig,
}

impl IssueService {
    pub fn new(
        pool: PgPool,
        storage: Arc<MinIOClient>,
        broadcaster: Arc<dyn Broadcaster>,
        config: IssueConfig,
    ) -> Self {
        Self {
            pool,
            storage,
            broadcaster,
            config,
        }
    }

    pub fn config(&self) -> &IssueConfig {
        &self.config
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Submit an issue with its photos
    ///
    /// Photos are uploaded first so no connection or lock is held across
    /// storage I/O. The quota check, issue row, image rows and the sector's
    /// notification then share one short transaction. Uploaded blobs are
    /// removed if anything fails.
    pub async fn create(
        &self,
        reporter: &AuthenticatedUser,
        input: NewIssueInput,
    ) -> Result<IssueDto> {
        let issue_id = Uuid::now_v7();
        let mut stored = Vec::new();

        let result = match self.upload_images(issue_id, &input, &mut stored).await {
            Ok(()) => self.record_issue(reporter, issue_id, &input, &stored).await,
            Err(e) => Err(e),
        };
        let (issue, notification) = match result {
            Ok(created) => created,
            Err(e) => {
                let keys: Vec<String> = stored.into_iter().map(|image| image.key).collect();
                self.storage.delete_best_effort(&keys).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Issue {} submitted by {} to sector {}",
            issue.id,
            reporter.id,
            issue.sector_id
        );

        self.publish(
            Channel::Sector(issue.sector_id),
            NEW_ISSUE_EVENT,
            notification,
        )
        .await;

        self.get_issue_dto(issue.id, true).await
    }

    /// Reject early when the reporter has no submissions left this week
    ///
    /// Runs before the upload is parsed. `create` repeats the check under the
    /// reporter's lock, which is the one that counts.
    pub async fn ensure_quota_available(&self, reporter_id: Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            tracing::error!("Failed to acquire connection: {:?}", e);
            AppError::Database(e)
        })?;
        self.enforce_quota(&mut *conn, reporter_id).await
    }

    async fn upload_images(
        &self,
        issue_id: Uuid,
        input: &NewIssueInput,
        stored: &mut Vec<StoredImage>,
    ) -> Result<()> {
        for image in &input.images {
            let image_id = Uuid::now_v7();
            let key = self
                .storage
                .issue_image_key(issue_id, image_id, image.extension);

            self.storage
                .upload(&key, &image.data, image.mime_type)
                .await?;

            stored.push(StoredImage {
                id: image_id,
                key,
                original_name: image.original_name.clone(),
                size: image.data.len() as i64,
                mime_type: image.mime_type,
            });
        }
        Ok(())
    }

    async fn record_issue(
        &self,
        reporter: &AuthenticatedUser,
        issue_id: Uuid,
        input: &NewIssueInput,
        images: &[StoredImage],
    ) -> Result<(Issue, Notification)> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin transaction: {:?}", e);
            AppError::Database(e)
        })?;

        // Serializes submissions of one reporter so the quota count stays exact
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::uuid::text, 0))")
            .bind(reporter.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to take submission lock: {:?}", e);
                AppError::Database(e)
            })?;

        self.enforce_quota(&mut *tx, reporter.id).await?;
        ensure_sector(&mut *tx, input.sector_id).await?;

        let issue = sqlx::query_as::<_, Issue>(&format!(
            r#"
            INSERT INTO issues (id, reporter_id, sector_id, description, latitude, longitude, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ISSUE_COLUMNS
        ))
        .bind(issue_id)
        .bind(reporter.id)
        .bind(input.sector_id)
        .bind(&input.description)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(IssueStatus::Submitted)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create issue: {:?}", e);
            AppError::Database(e)
        })?;

        for image in images {
            sqlx::query(
                r#"
                INSERT INTO issue_images (id, issue_id, path, original_name, size, mime_type)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(image.id)
            .bind(issue.id)
            .bind(&image.key)
            .bind(&image.original_name)
            .bind(image.size)
            .bind(image.mime_type)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to record issue image: {:?}", e);
                AppError::Database(e)
            })?;
        }

        let notification = NotificationService::insert(
            &mut *tx,
            &NewNotification {
                user_id: issue.sector_id,
                title: NEW_ISSUE_TITLE.to_string(),
                message: NEW_ISSUE_MESSAGE.to_string(),
                kind: NotificationType::NewIssue,
                issue_id: issue.id,
            },
        )
        .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit issue: {:?}", e);
            AppError::Database(e)
        })?;

        Ok((issue, notification))
    }

    async fn enforce_quota(&self, conn: &mut PgConnection, reporter_id: Uuid) -> Result<()> {
        let limit = self.config.weekly_submission_limit;
        if limit <= 0 {
            return Ok(());
        }

        let (used, _) = count_recent_submissions(conn, reporter_id).await?;
        if used >= limit {
            tracing::info!(
                "Reporter {} hit the weekly limit ({}/{})",
                reporter_id,
                used,
                limit
            );
            return Err(AppError::RateLimitExceeded(format!(
                "Weekly submission limit reached ({}/{}). Please try again next week.",
                used, limit
            )));
        }

        Ok(())
    }

    pub async fn quota_status(&self, reporter_id: Uuid) -> Result<QuotaStatusDto> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            tracing::error!("Failed to acquire connection: {:?}", e);
            AppError::Database(e)
        })?;
        let (used, oldest) = count_recent_submissions(&mut *conn, reporter_id).await?;

        Ok(policy::quota_status(
            self.config.weekly_submission_limit,
            used,
            oldest,
        ))
    }

    // =========================================================================
    // TRIAGE
    // =========================================================================

    /// Move an issue along the workflow; returns the issue and whether it changed
    pub async fn update_status(
        &self,
        user: &AuthenticatedUser,
        issue_id: Uuid,
        requested: &str,
    ) -> Result<(IssueDto, bool)> {
        let issue = self.find_issue(issue_id).await?;

        if !policy::can_update_status(user, &issue) {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }

        let (from, to) = match policy::plan_transition(issue.status, requested)? {
            Transition::NoChange => return Ok((self.get_issue_dto(issue_id, true).await?, false)),
            Transition::Move { from, to } => (from, to),
        };

        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin transaction: {:?}", e);
            AppError::Database(e)
        })?;

        let updated = apply_transition(&mut *tx, issue_id, from, to).await?;

        let notification = NotificationService::insert(
            &mut *tx,
            &NewNotification {
                user_id: updated.reporter_id,
                title: STATUS_UPDATE_TITLE.to_string(),
                message: format!("Your issue status was updated to {}.", to),
                kind: NotificationType::StatusUpdate,
                issue_id: updated.id,
            },
        )
        .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit status update: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::info!(
            "Issue {} moved from {} to {} by {}",
            issue_id,
            from,
            to,
            user.id
        );

        self.publish(
            Channel::User(updated.reporter_id),
            STATUS_UPDATED_EVENT,
            notification,
        )
        .await;

        Ok((self.get_issue_dto(issue_id, true).await?, true))
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub async fn get_for_user(&self, user: &AuthenticatedUser, issue_id: Uuid) -> Result<IssueDto> {
        let issue = self.find_issue(issue_id).await?;
        if !policy::can_view(user, &issue) {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }
        self.get_issue_dto(issue_id, true).await
    }

    /// Page of issues matching `filter`, newest first, with the total count
    pub async fn list(
        &self,
        filter: &IssueFilter,
        pagination: &PaginationQuery,
        include_reporter: bool,
    ) -> Result<(Vec<IssueDto>, i64)> {
        let search = filter.search.as_deref().map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM issues i JOIN users s ON s.id = i.sector_id {}",
            FILTER_WHERE
        ))
        .bind(filter.sector_id)
        .bind(filter.reporter_id)
        .bind(filter.status)
        .bind(&search)
        .bind(&filter.sector_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count issues: {:?}", e);
            AppError::Database(e)
        })?;

        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            "{} {} ORDER BY i.created_at DESC, i.id DESC LIMIT $6 OFFSET $7",
            ISSUE_ROW_SELECT, FILTER_WHERE
        ))
        .bind(filter.sector_id)
        .bind(filter.reporter_id)
        .bind(filter.status)
        .bind(&search)
        .bind(&filter.sector_name)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list issues: {:?}", e);
            AppError::Database(e)
        })?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut images = self.images_by_issue(&ids).await?;

        let issues = rows
            .into_iter()
            .map(|row| {
                let images = images.remove(&row.id).unwrap_or_default();
                self.to_dto(row, images, include_reporter)
            })
            .collect();

        Ok((issues, total))
    }

    async fn find_issue(&self, issue_id: Uuid) -> Result<Issue> {
        sqlx::query_as::<_, Issue>(&format!(
            "SELECT {} FROM issues WHERE id = $1",
            ISSUE_COLUMNS
        ))
        .bind(issue_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch issue: {:?}", e);
            AppError::Database(e)
        })?
        .ok_or_else(|| AppError::NotFound("Issue not found".to_string()))
    }

    async fn get_issue_dto(&self, issue_id: Uuid, include_reporter: bool) -> Result<IssueDto> {
        let row = sqlx::query_as::<_, IssueRow>(&format!("{} WHERE i.id = $1", ISSUE_ROW_SELECT))
            .bind(issue_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch issue: {:?}", e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound("Issue not found".to_string()))?;

        let images = self
            .images_by_issue(&[issue_id])
            .await?
            .remove(&issue_id)
            .unwrap_or_default();

        Ok(self.to_dto(row, images, include_reporter))
    }

    async fn images_by_issue(&self, issue_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<IssueImage>>> {
        if issue_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let images = sqlx::query_as::<_, IssueImage>(&format!(
            "SELECT {} FROM issue_images WHERE issue_id = ANY($1) ORDER BY created_at, id",
            ISSUE_IMAGE_COLUMNS
        ))
        .bind(issue_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch issue images: {:?}", e);
            AppError::Database(e)
        })?;

        let mut grouped: HashMap<Uuid, Vec<IssueImage>> = HashMap::new();
        for image in images {
            grouped.entry(image.issue_id).or_default().push(image);
        }
        Ok(grouped)
    }

    fn to_dto(&self, row: IssueRow, images: Vec<IssueImage>, include_reporter: bool) -> IssueDto {
        let reporter = include_reporter.then(|| UserSummaryDto {
            id: row.reporter_id,
            name: row.reporter_name,
            email: row.reporter_email,
        });

        IssueDto {
            id: row.id,
            description: row.description,
            latitude: row.latitude,
            longitude: row.longitude,
            status: row.status,
            reporter,
            sector: UserSummaryDto {
                id: row.sector_id,
                name: row.sector_name,
                email: row.sector_email,
            },
            images: images
                .into_iter()
                .map(|img| IssueImageDto {
                    id: img.id,
                    url: self.storage.public_url(&img.path),
                    path: img.path,
                    original_name: img.original_name,
                    size: img.size,
                    mime_type: img.mime_type,
                })
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    async fn publish(&self, channel: Channel, event: &'static str, notification: Notification) {
        match BroadcastEvent::notification(channel, event, &NotificationDto::from(notification)) {
            Ok(event) => broadcast_best_effort(self.broadcaster.as_ref(), event).await,
            Err(e) => tracing::warn!("Failed to build '{}' event: {}", event, e),
        }
    }
}

/// Move the issue from `from` to `to`, or 409 when it is no longer at `from`
///
/// Conditional on the status that was validated, so two concurrent moves
/// cannot both succeed.
async fn apply_transition(
    conn: &mut PgConnection,
    issue_id: Uuid,
    from: IssueStatus,
    to: IssueStatus,
) -> Result<Issue> {
    sqlx::query_as::<_, Issue>(&format!(
        r#"
        UPDATE issues
        SET status = $3, updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {}
        "#,
        ISSUE_COLUMNS
    ))
    .bind(issue_id)
    .bind(from)
    .bind(to)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update issue status: {:?}", e);
        AppError::Database(e)
    })?
    .ok_or_else(|| AppError::Conflict("Issue status was changed by another request".to_string()))
}

/// Submissions by the reporter inside the rolling window, and the oldest of them
async fn count_recent_submissions(
    conn: &mut PgConnection,
    reporter_id: Uuid,
) -> Result<(i64, Option<DateTime<Utc>>)> {
    sqlx::query_as::<_, (i64, Option<DateTime<Utc>>)>(
        r#"
        SELECT COUNT(*), MIN(created_at)
        FROM issues
        WHERE reporter_id = $1 AND created_at >= $2
        "#,
    )
    .bind(reporter_id)
    .bind(policy::quota_window_start(Utc::now()))
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to count recent submissions: {:?}", e);
        AppError::Database(e)
    })
}

async fn ensure_sector(conn: &mut PgConnection, sector_id: Uuid) -> Result<()> {
    let is_sector: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND role = 'sector')",
    )
    .bind(sector_id)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to look up sector: {:?}", e);
        AppError::Database(e)
    })?;

    if !is_sector {
        return Err(AppError::Validation(
            "The selected sector_id is invalid".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::UserRole;
    use crate::features::broadcasting::broadcaster::testing::RecordingBroadcaster;
    use crate::features::issues::dtos::ValidImage;
    use crate::shared::test_helpers::{insert_user, offline_storage, test_user};

    fn service(pool: PgPool, limit: i64) -> (IssueService, Arc<RecordingBroadcaster>) {
        let recorder = Arc::new(RecordingBroadcaster::default());
        let service = IssueService::new(
            pool,
            Arc::new(offline_storage()),
            recorder.clone(),
            IssueConfig {
                weekly_submission_limit: limit,
                ..IssueConfig::default()
            },
        );
        (service, recorder)
    }

    fn input(sector_id: Uuid) -> NewIssueInput {
        NewIssueInput {
            description: "Streetlight out on 5th Avenue".to_string(),
            sector_id,
            latitude: -6.2,
            longitude: 106.8,
            images: Vec::new(),
        }
    }

    async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
        sqlx::query_scalar(sql).bind(id).fetch_one(pool).await.unwrap()
    }

    async fn issues_of(pool: &PgPool, reporter_id: Uuid) -> i64 {
        count(pool, "SELECT COUNT(*) FROM issues WHERE reporter_id = $1", reporter_id).await
    }

    fn recorded(recorder: &RecordingBroadcaster) -> Vec<BroadcastEvent> {
        recorder.events.lock().unwrap().clone()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_create_notifies_sector_once(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let (service, recorder) = service(pool.clone(), 5);

        let issue = service.create(&citizen, input(sector.id)).await.unwrap();
        assert_eq!(issue.status, IssueStatus::Submitted);
        assert_eq!(issue.sector.id, sector.id);

        let rows = count(
            &pool,
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND type = 'new_issue'",
            sector.id,
        )
        .await;
        assert_eq!(rows, 1);

        let events = recorded(&recorder);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].channel, Channel::Sector(sector.id));
        assert_eq!(events[0].name, NEW_ISSUE_EVENT);
        assert_eq!(
            events[0].payload["notification"]["issue_id"],
            serde_json::json!(issue.id)
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_quota_rejects_submission_over_limit(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let (service, recorder) = service(pool.clone(), 2);

        service.create(&citizen, input(sector.id)).await.unwrap();
        service.create(&citizen, input(sector.id)).await.unwrap();

        let third = service.create(&citizen, input(sector.id)).await;
        assert!(matches!(third, Err(AppError::RateLimitExceeded(_))));
        assert!(matches!(
            service.ensure_quota_available(citizen.id).await,
            Err(AppError::RateLimitExceeded(_))
        ));

        let issues = issues_of(&pool, citizen.id).await;
        assert_eq!(issues, 2);
        assert_eq!(recorded(&recorder).len(), 2);

        let quota = service.quota_status(citizen.id).await.unwrap();
        assert_eq!(quota.used, 2);
        assert_eq!(quota.remaining, Some(0));
        assert!(!quota.can_submit);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_submissions_respect_quota(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let (service, _) = service(pool.clone(), 1);

        let (a, b) = tokio::join!(
            service.create(&citizen, input(sector.id)),
            service.create(&citizen, input(sector.id)),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

        let issues = issues_of(&pool, citizen.id).await;
        assert_eq!(issues, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_rejects_target_that_is_not_a_sector(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let admin = insert_user(&pool, UserRole::Admin).await;
        let (service, recorder) = service(pool.clone(), 5);

        for target in [admin.id, citizen.id, Uuid::now_v7()] {
            let result = service.create(&citizen, input(target)).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }

        let issues = issues_of(&pool, citizen.id).await;
        assert_eq!(issues, 0);
        assert!(recorded(&recorder).is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_failed_upload_records_nothing(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let (service, recorder) = service(pool.clone(), 5);

        let mut with_photo = input(sector.id);
        with_photo.images.push(ValidImage {
            original_name: Some("pothole.png".to_string()),
            mime_type: "image/png",
            extension: "png",
            data: vec![0x89, b'P', b'N', b'G'],
        });

        assert!(service.create(&citizen, with_photo).await.is_err());

        let issues = issues_of(&pool, citizen.id).await;
        let notifications = count(
            &pool,
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1",
            sector.id,
        )
        .await;
        assert_eq!(issues, 0);
        assert_eq!(notifications, 0);
        assert!(recorded(&recorder).is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_status_change_notifies_reporter_once(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let (service, recorder) = service(pool.clone(), 5);
        let issue = service.create(&citizen, input(sector.id)).await.unwrap();

        let (moved, changed) = service
            .update_status(&sector, issue.id, "inprogress")
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(moved.status, IssueStatus::InProgress);

        let (same, changed) = service
            .update_status(&sector, issue.id, "inprogress")
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(same.status, IssueStatus::InProgress);

        let rows = count(
            &pool,
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND type = 'status_update'",
            citizen.id,
        )
        .await;
        assert_eq!(rows, 1);

        let events = recorded(&recorder);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].channel, Channel::User(citizen.id));
        assert_eq!(events[1].name, STATUS_UPDATED_EVENT);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_stale_transition_conflicts(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let (service, _) = service(pool.clone(), 5);
        let issue = service.create(&citizen, input(sector.id)).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let (from, to) = (IssueStatus::Submitted, IssueStatus::InProgress);

        let moved = apply_transition(&mut *conn, issue.id, from, to).await.unwrap();
        assert_eq!(moved.status, IssueStatus::InProgress);

        let stale = apply_transition(&mut *conn, issue.id, from, to).await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_moves_change_once(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let (service, _) = service(pool.clone(), 5);
        let issue = service.create(&citizen, input(sector.id)).await.unwrap();

        let (a, b) = tokio::join!(
            service.update_status(&sector, issue.id, "inprogress"),
            service.update_status(&sector, issue.id, "inprogress"),
        );

        let mut changed = 0;
        for result in [a, b] {
            match result {
                Ok((_, true)) => changed += 1,
                Ok((_, false)) | Err(AppError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(changed, 1);

        let rows = count(
            &pool,
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND type = 'status_update'",
            citizen.id,
        )
        .await;
        assert_eq!(rows, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_only_assigned_sector_moves_issue(pool: PgPool) {
        let citizen = insert_user(&pool, UserRole::Citizen).await;
        let sector = insert_user(&pool, UserRole::Sector).await;
        let other = insert_user(&pool, UserRole::Sector).await;
        let (service, _) = service(pool.clone(), 5);
        let issue = service.create(&citizen, input(sector.id)).await.unwrap();

        for user in [&other, &citizen] {
            let result = service.update_status(user, issue.id, "inprogress").await;
            assert!(matches!(result, Err(AppError::Forbidden(_))));
        }
        let skipped = service.update_status(&sector, issue.id, "solved").await;
        assert!(matches!(skipped, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_filter_scope_by_role() {
        let admin = test_user(UserRole::Admin);
        let sector = test_user(UserRole::Sector);
        let citizen = test_user(UserRole::Citizen);

        let f = IssueFilter::scoped_to(&admin);
        assert!(f.sector_id.is_none() && f.reporter_id.is_none());

        let f = IssueFilter::scoped_to(&sector);
        assert_eq!(f.sector_id, Some(sector.id));
        assert!(f.reporter_id.is_none());

        let f = IssueFilter::scoped_to(&citizen);
        assert_eq!(f.reporter_id, Some(citizen.id));
        assert!(f.sector_id.is_none());
    }
}
