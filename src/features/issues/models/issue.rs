use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Workflow state of an issue, matching the `issue_status` database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "issue_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Submitted,
    InProgress,
    Solved,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 3] = [
        IssueStatus::Submitted,
        IssueStatus::InProgress,
        IssueStatus::Solved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Submitted => "submitted",
            IssueStatus::InProgress => "inprogress",
            IssueStatus::Solved => "solved",
        }
    }

    /// States reachable in one step: submitted -> inprogress -> solved
    pub fn next_statuses(&self) -> &'static [IssueStatus] {
        match self {
            IssueStatus::Submitted => &[IssueStatus::InProgress],
            IssueStatus::InProgress => &[IssueStatus::Solved],
            IssueStatus::Solved => &[],
        }
    }

    pub fn can_transition_to(&self, next: IssueStatus) -> bool {
        self.next_statuses().contains(&next)
    }

    /// Status from a public filter value, accepting the UI aliases
    /// `open`, `progress` and `resolved` as well as the stored names
    pub fn from_filter(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "open" | "submitted" => Some(IssueStatus::Submitted),
            "progress" | "inprogress" => Some(IssueStatus::InProgress),
            "resolved" | "solved" => Some(IssueStatus::Solved),
            _ => None,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown status '{}'", s))
    }
}

/// Database model for a reported issue
#[derive(Debug, Clone, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub sector_id: Uuid,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ISSUE_COLUMNS: &str =
    "id, reporter_id, sector_id, description, latitude, longitude, status, created_at, updated_at";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_follow_adjacency() {
        use IssueStatus::*;

        let allowed = [(Submitted, InProgress), (InProgress, Solved)];
        for from in IssueStatus::ALL {
            for to in IssueStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_solved_is_terminal() {
        assert!(IssueStatus::Solved.next_statuses().is_empty());
    }

    #[test]
    fn test_filter_aliases() {
        assert_eq!(IssueStatus::from_filter("open"), Some(IssueStatus::Submitted));
        assert_eq!(IssueStatus::from_filter("progress"), Some(IssueStatus::InProgress));
        assert_eq!(IssueStatus::from_filter("resolved"), Some(IssueStatus::Solved));
        assert_eq!(IssueStatus::from_filter("Solved"), Some(IssueStatus::Solved));
        assert_eq!(IssueStatus::from_filter("closed"), None);
        assert_eq!(IssueStatus::from_filter(""), None);
    }

    #[test]
    fn test_from_str_is_strict() {
        assert_eq!("inprogress".parse::<IssueStatus>(), Ok(IssueStatus::InProgress));
        assert!("open".parse::<IssueStatus>().is_err());
        assert!("InProgress".parse::<IssueStatus>().is_err());
    }

    #[test]
    fn test_serde_names_match_database() {
        assert_eq!(
            serde_json::to_string(&IssueStatus::InProgress).unwrap(),
            "\"inprogress\""
        );
    }
}
