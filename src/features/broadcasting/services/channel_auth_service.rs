use crate::core::config::BroadcastConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::broadcasting::channel::can_access;
use crate::features::broadcasting::dtos::ChannelAuthResponseDto;
use crate::features::broadcasting::signature::PusherSigner;
use crate::shared::validation::SOCKET_ID_REGEX;

/// Signs private-channel subscriptions for authorized identities
pub struct ChannelAuthService {
    signer: Option<PusherSigner>,
}

impl ChannelAuthService {
    pub fn new(signer: Option<PusherSigner>) -> Self {
        Self { signer }
    }

    pub fn from_config(config: &BroadcastConfig) -> Self {
        Self::new(
            config
                .pusher
                .as_ref()
                .map(|p| PusherSigner::new(&p.key, &p.secret)),
        )
    }

    pub fn authorize(
        &self,
        user: &AuthenticatedUser,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<ChannelAuthResponseDto> {
        if !SOCKET_ID_REGEX.is_match(socket_id) {
            return Err(AppError::Validation("Invalid socket_id".to_string()));
        }

        if !can_access(user, channel_name) {
            tracing::info!(
                "Denied channel {} to user {} ({})",
                channel_name,
                user.id,
                user.role
            );
            return Err(AppError::Forbidden(
                "Not allowed to subscribe to this channel".to_string(),
            ));
        }

        let signer = self.signer.as_ref().ok_or_else(|| {
            AppError::ExternalServiceError("Realtime broadcasting is not configured".to_string())
        })?;

        Ok(ChannelAuthResponseDto {
            auth: signer.channel_auth(socket_id, channel_name)?,
        })
    }
}
