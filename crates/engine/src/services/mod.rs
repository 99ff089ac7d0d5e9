//! Engine-side services.

pub mod http_notification;
pub mod sink;

pub use http_notification::{GatewayError, HttpNotificationPort};
pub use sink::AlertSink;
