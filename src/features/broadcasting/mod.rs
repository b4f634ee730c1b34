pub mod broadcaster;
pub mod channel;
pub mod dtos;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod signature;

pub use broadcaster::{broadcast_best_effort, BroadcastEvent, Broadcaster};
pub use channel::Channel;
