//! Outbound notification port.
//!
//! Monitors only depend on [`NotificationPort`]; the SMS/WhatsApp transport
//! lives behind it.

use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a notification send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationResult {
    /// Notification was handed to the transport.
    Sent,
    /// Sending failed; the caller carries on regardless.
    Failed(String),
    /// Nothing was sent (e.g. no destination).
    Skipped,
}

impl NotificationResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationResult::Sent)
    }
}

/// Abstract outbound messaging channel.
#[async_trait::async_trait]
pub trait NotificationPort: Send + Sync {
    /// Send `message` to a destination address such as a phone number.
    async fn send(&self, destination: &str, message: &str) -> NotificationResult;
}

/// Port that only logs messages. Used when no transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationPort;

#[async_trait::async_trait]
impl NotificationPort for LogNotificationPort {
    async fn send(&self, destination: &str, message: &str) -> NotificationResult {
        if destination.trim().is_empty() {
            return NotificationResult::Skipped;
        }
        tracing::info!(
            destination = %destination,
            message_len = message.len(),
            "Notification logged (no transport configured)"
        );
        NotificationResult::Sent
    }
}

/// A message captured by [`MockNotificationPort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub destination: String,
    pub message: String,
}

/// Mock notification port for testing.
///
/// Records every message it accepts so tests can assert on them.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationPort {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl MockNotificationPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock port that fails every send.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            sent: Arc::default(),
        }
    }

    /// Messages accepted so far, oldest first.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }

    /// Messages accepted for one destination.
    pub async fn sent_to(&self, destination: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|n| n.destination == destination)
            .map(|n| n.message.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl NotificationPort for MockNotificationPort {
    async fn send(&self, destination: &str, message: &str) -> NotificationResult {
        if self.simulate_failure {
            tracing::warn!(
                destination = %destination,
                "Mock notification port simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(destination = %destination, "Mock: Would send notification");
        self.sent.lock().await.push(SentNotification {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        NotificationResult::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_messages() {
        let port = MockNotificationPort::new();
        assert!(port.send("9800000001", "hello").await.is_sent());
        port.send("9800000002", "other").await;

        assert_eq!(port.sent().await.len(), 2);
        assert_eq!(port.sent_to("9800000001").await, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_mock_records_nothing() {
        let port = MockNotificationPort::failing();
        let result = port.send("9800000001", "hello").await;
        assert_eq!(result, NotificationResult::Failed("Simulated failure".into()));
        assert!(port.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_history() {
        let port = MockNotificationPort::new();
        let clone = port.clone();
        clone.send("9800000003", "shared").await;
        assert_eq!(port.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_log_port_skips_empty_destination() {
        let port = LogNotificationPort;
        assert_eq!(port.send("  ", "hi").await, NotificationResult::Skipped);
        assert_eq!(port.send("9800000001", "hi").await, NotificationResult::Sent);
    }
}
