use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subscription request sent by a realtime client library
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChannelAuthRequestDto {
    /// Connection id assigned by the relay, e.g. "1234.5678"
    pub socket_id: String,
    /// e.g. "private-user.{id}"
    pub channel_name: String,
}

/// Returned as-is (no envelope) because client libraries read `auth` directly
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChannelAuthResponseDto {
    pub auth: String,
}
