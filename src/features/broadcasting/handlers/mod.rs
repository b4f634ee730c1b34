pub mod channel_auth_handler;

pub use channel_auth_handler::{__path_authorize_channel, authorize_channel};
