pub mod auth;
pub mod broadcasting;
pub mod issues;
pub mod notifications;
pub mod sectors;
pub mod users;
