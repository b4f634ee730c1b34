pub mod issue_handler;

pub use issue_handler::{
    __path_create_issue, __path_get_issue, __path_get_quota, __path_list_issues,
    __path_list_public_issues, __path_update_issue_status, create_issue, get_issue, get_quota,
    list_issues, list_public_issues, update_issue_status,
};
