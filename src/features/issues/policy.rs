//! Who may see and move an issue, and which moves are legal.

use chrono::{DateTime, Duration, Utc};

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::dtos::QuotaStatusDto;
use crate::features::issues::models::{Issue, IssueStatus};
use crate::shared::constants::SUBMISSION_WINDOW_DAYS;

/// Admin, the reporter, or the sector the issue is assigned to
pub fn can_view(user: &AuthenticatedUser, issue: &Issue) -> bool {
    user.is_admin()
        || issue.reporter_id == user.id
        || (user.is_sector() && issue.sector_id == user.id)
}

/// Admin, or the sector the issue is assigned to
pub fn can_update_status(user: &AuthenticatedUser, issue: &Issue) -> bool {
    user.is_admin() || (user.is_sector() && issue.sector_id == user.id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NoChange,
    Move { from: IssueStatus, to: IssueStatus },
}

/// Check a requested status against the workflow
pub fn plan_transition(current: IssueStatus, requested: &str) -> Result<Transition> {
    let next: IssueStatus = requested
        .trim()
        .parse()
        .map_err(|_| AppError::Validation("The selected status is invalid".to_string()))?;

    if next == current {
        return Ok(Transition::NoChange);
    }

    if !current.can_transition_to(next) {
        return Err(AppError::Validation(format!(
            "Invalid status transition from {} to {}",
            current, next
        )));
    }

    Ok(Transition::Move {
        from: current,
        to: next,
    })
}

/// Start of the rolling submission window ending at `now`
pub fn quota_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(SUBMISSION_WINDOW_DAYS)
}

/// Quota figures from the submissions counted in the current window
///
/// `limit == 0` disables the quota.
pub fn quota_status(limit: i64, used: i64, oldest: Option<DateTime<Utc>>) -> QuotaStatusDto {
    if limit <= 0 {
        return QuotaStatusDto {
            limit: None,
            used,
            remaining: None,
            can_submit: true,
            resets_at: None,
        };
    }

    QuotaStatusDto {
        limit: Some(limit),
        used,
        remaining: Some((limit - used).max(0)),
        can_submit: used < limit,
        resets_at: oldest.map(|t| t + Duration::days(SUBMISSION_WINDOW_DAYS)),
    }
}
