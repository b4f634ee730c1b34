pub mod user_admin_dto;

pub use user_admin_dto::*;
