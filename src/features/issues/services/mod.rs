pub mod issue_service;

pub use issue_service::{IssueFilter, IssueService};
