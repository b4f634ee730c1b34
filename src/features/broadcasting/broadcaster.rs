//! Realtime event delivery.
//!
//! Events are published once, after the database change they describe has
//! been committed. A relay outage never fails the request that caused the
//! event; the notification row stays the source of truth.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::core::config::{BroadcastConfig, BroadcastDriver, PusherConfig};
use crate::core::error::{AppError, Result};
use crate::features::broadcasting::channel::Channel;
use crate::features::broadcasting::signature::PusherSigner;

pub const NEW_ISSUE_EVENT: &str = "new-issue";
pub const STATUS_UPDATED_EVENT: &str = "status-updated";

#[derive(Debug, Clone)]
pub struct BroadcastEvent {
    pub channel: Channel,
    pub name: &'static str,
    pub payload: Value,
}

impl BroadcastEvent {
    /// Event carrying a notification as `{"notification": {...}}`
    pub fn notification<T: Serialize>(
        channel: Channel,
        name: &'static str,
        notification: &T,
    ) -> Result<Self> {
        let notification = serde_json::to_value(notification)
            .map_err(|e| AppError::Internal(format!("Failed to serialize event: {}", e)))?;

        Ok(Self {
            channel,
            name,
            payload: serde_json::json!({ "notification": notification }),
        })
    }
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, event: &BroadcastEvent) -> Result<()>;
}

/// Publish without letting a delivery failure escape
pub async fn broadcast_best_effort(broadcaster: &dyn Broadcaster, event: BroadcastEvent) {
    if let Err(e) = broadcaster.broadcast(&event).await {
        tracing::warn!(
            "Failed to broadcast '{}' on {}: {}",
            event.name,
            event.channel,
            e
        );
    }
}

/// Build the broadcaster selected by `BROADCAST_DRIVER`
pub fn from_config(config: &BroadcastConfig) -> Result<Arc<dyn Broadcaster>> {
    match config.driver {
        BroadcastDriver::Pusher => {
            let pusher = config.pusher.as_ref().ok_or_else(|| {
                AppError::Internal("Pusher driver selected without credentials".to_string())
            })?;
            Ok(Arc::new(PusherBroadcaster::new(pusher)?))
        }
        BroadcastDriver::Log => Ok(Arc::new(LogBroadcaster)),
        BroadcastDriver::Null => Ok(Arc::new(NullBroadcaster)),
    }
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [String; 1],
    /// Pusher expects the event data as a JSON-encoded string
    data: String,
}

/// Publishes through the HTTP API of a Pusher-compatible relay
pub struct PusherBroadcaster {
    http_client: Client,
    signer: PusherSigner,
    base_url: String,
    events_path: String,
}

impl PusherBroadcaster {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(config: &PusherConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            signer: PusherSigner::new(&config.key, &config.secret),
            base_url: config.api_base_url(),
            events_path: format!("/apps/{}/events", config.app_id),
        })
    }

    fn trigger_body(event: &BroadcastEvent) -> Result<Vec<u8>> {
        let body = TriggerBody {
            name: event.name,
            channels: [event.channel.to_string()],
            data: event.payload.to_string(),
        };
        serde_json::to_vec(&body)
            .map_err(|e| AppError::Internal(format!("Failed to serialize event: {}", e)))
    }
}

#[async_trait]
impl Broadcaster for PusherBroadcaster {
    async fn broadcast(&self, event: &BroadcastEvent) -> Result<()> {
        let body = Self::trigger_body(event)?;
        let query = self.signer.signed_query(
            "POST",
            &self.events_path,
            &body,
            chrono::Utc::now().timestamp(),
        )?;

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, self.events_path))
            .query(&query)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Broadcast relay unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalServiceError(format!(
                "Broadcast relay rejected event: {} - {}",
                status, body
            )));
        }

        tracing::debug!("Broadcast '{}' on {}", event.name, event.channel);
        Ok(())
    }
}

/// Writes events to the log instead of a relay
pub struct LogBroadcaster;

#[async_trait]
impl Broadcaster for LogBroadcaster {
    async fn broadcast(&self, event: &BroadcastEvent) -> Result<()> {
        tracing::info!(
            channel = %event.channel,
            event = event.name,
            payload = %event.payload,
            "Broadcasting event"
        );
        Ok(())
    }
}

/// Drops every event
pub struct NullBroadcaster;

#[async_trait]
impl Broadcaster for NullBroadcaster {
    async fn broadcast(&self, _event: &BroadcastEvent) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records events for assertions
    #[derive(Default)]
    pub struct RecordingBroadcaster {
        pub events: Mutex<Vec<BroadcastEvent>>,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(&self, event: &BroadcastEvent) -> Result<()> {
            self.events
                .lock()
                .map_err(|_| AppError::Internal("poisoned".to_string()))?
                .push(event.clone());
            Ok(())
        }
    }

    /// Fails every delivery
    pub struct FailingBroadcaster;

    #[async_trait]
    impl Broadcaster for FailingBroadcaster {
        async fn broadcast(&self, _event: &BroadcastEvent) -> Result<()> {
            Err(AppError::ExternalServiceError("relay down".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingBroadcaster, RecordingBroadcaster};
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_notification_payload_shape() {
        let id = Uuid::now_v7();
        let event = BroadcastEvent::notification(
            Channel::Sector(id),
            NEW_ISSUE_EVENT,
            &serde_json::json!({ "title": "New Issue Reported" }),
        )
        .unwrap();

        assert_eq!(event.payload["notification"]["title"], "New Issue Reported");
        assert_eq!(event.channel.to_string(), format!("private-sector.{}", id));
    }

    #[test]
    fn test_trigger_body_encodes_data_as_string() {
        let id = Uuid::now_v7();
        let event = BroadcastEvent {
            channel: Channel::User(id),
            name: STATUS_UPDATED_EVENT,
            payload: serde_json::json!({ "notification": { "id": 1 } }),
        };

        let body = PusherBroadcaster::trigger_body(&event).unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed["name"], "status-updated");
        assert_eq!(parsed["channels"][0], format!("private-user.{}", id));
        assert_eq!(parsed["data"], r#"{"notification":{"id":1}}"#);
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failures() {
        let event = BroadcastEvent {
            channel: Channel::User(Uuid::now_v7()),
            name: STATUS_UPDATED_EVENT,
            payload: Value::Null,
        };
        broadcast_best_effort(&FailingBroadcaster, event).await;
    }

    #[tokio::test]
    async fn test_recording_broadcaster_sees_events() {
        let recorder = RecordingBroadcaster::default();
        let event = BroadcastEvent {
            channel: Channel::User(Uuid::now_v7()),
            name: STATUS_UPDATED_EVENT,
            payload: Value::Null,
        };
        broadcast_best_effort(&recorder, event).await;
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_from_config_requires_pusher_credentials() {
        let config = BroadcastConfig {
            driver: BroadcastDriver::Pusher,
            pusher: None,
        };
        assert!(from_config(&config).is_err());

        let config = BroadcastConfig {
            driver: BroadcastDriver::Null,
            pusher: None,
        };
        assert!(from_config(&config).is_ok());
    }
}
