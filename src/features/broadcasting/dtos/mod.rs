pub mod channel_auth_dto;

pub use channel_auth_dto::*;
