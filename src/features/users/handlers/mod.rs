pub mod user_admin_handler;

pub use user_admin_handler::{__path_list_users, __path_update_user, list_users, update_user};
