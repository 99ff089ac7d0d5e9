//! SMS/WhatsApp gateway notification port.
//!
//! Posts `{ "to": ..., "message": ... }` as JSON to the configured gateway.
//! Any non-2xx answer is reported as a failed send; the caller decides what
//! to do with it (monitors only log it).

use std::time::Duration;

use async_trait::async_trait;
use domain::services::{NotificationPort, NotificationResult};
use reqwest::Client;
use serde::Serialize;

use crate::config::NotificationsConfig;

/// Notification port backed by an HTTP messaging gateway.
pub struct HttpNotificationPort {
    client: Client,
    gateway_url: String,
}

/// Error type for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Gateway URL is not configured")]
    NotConfigured,
}

#[derive(Debug, Serialize)]
struct GatewayMessage<'a> {
    to: &'a str,
    message: &'a str,
}

impl HttpNotificationPort {
    /// Create a gateway port.
    ///
    /// # Errors
    /// Returns an error if the gateway URL is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: &NotificationsConfig) -> Result<Self, GatewayError> {
        if config.gateway_url.trim().is_empty() {
            return Err(GatewayError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            gateway_url: config.gateway_url.clone(),
        })
    }

    async fn post(&self, destination: &str, message: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(&self.gateway_url)
            .json(&GatewayMessage {
                to: destination,
                message,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl NotificationPort for HttpNotificationPort {
    async fn send(&self, destination: &str, message: &str) -> NotificationResult {
        if destination.trim().is_empty() {
            return NotificationResult::Skipped;
        }

        match self.post(destination, message).await {
            Ok(()) => {
                tracing::debug!(destination = %destination, "Gateway accepted notification");
                NotificationResult::Sent
            }
            Err(e) => {
                tracing::warn!(destination = %destination, error = %e, "Gateway send failed");
                NotificationResult::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> NotificationsConfig {
        NotificationsConfig {
            provider: "http".to_string(),
            gateway_url: url.to_string(),
            timeout_ms: 500,
        }
    }

    #[test]
    fn test_requires_gateway_url() {
        let result = HttpNotificationPort::new(&config("  "));
        assert!(matches!(result, Err(GatewayError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_empty_destination_is_skipped() {
        let port = HttpNotificationPort::new(&config("http://127.0.0.1:9/send")).unwrap();
        assert_eq!(port.send("", "hello").await, NotificationResult::Skipped);
    }

    #[tokio::test]
    async fn test_unreachable_gateway_fails_softly() {
        let port = HttpNotificationPort::new(&config("http://127.0.0.1:9/send")).unwrap();
        let result = port.send("9800000001", "hello").await;
        assert!(matches!(result, NotificationResult::Failed(_)));
    }

    #[test]
    fn test_payload_shape() {
        let body = serde_json::to_value(GatewayMessage {
            to: "9800000001",
            message: "hi",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"to": "9800000001", "message": "hi"}));
    }
}
