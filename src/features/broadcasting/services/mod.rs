pub mod channel_auth_service;

pub use channel_auth_service::ChannelAuthService;
