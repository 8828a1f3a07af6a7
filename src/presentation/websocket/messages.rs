//! WebSocket Message Types
//!
//! Every frame is a JSON object `{ "event": ..., "data": ... }` in both
//! directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::services::FanoutError;
use crate::domain::ports::PushEvent;

/// Inbound chat message event
pub const MESSAGES_EVENT: &str = "messages";

/// Outbound error event
pub const EXCEPTION_EVENT: &str = "exception";

/// Sent once the connection has been authenticated
pub const CONNECTED_EVENT: &str = "connected";

/// Incoming frame
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// `messages` payload
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub message: String,
    pub conversation_id: i64,
    pub user_id: i64,
}

/// `exception` payload
#[derive(Debug, Serialize)]
pub struct ExceptionPayload {
    pub status: &'static str,
    pub message: String,
}

/// `connected` payload
#[derive(Debug, Serialize)]
pub struct ConnectedPayload {
    pub connection_id: String,
    pub user_id: i64,
}

/// Failures reported to the client as `exception` events
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Sender does not match the authenticated user")]
    SenderMismatch,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error(transparent)]
    Fanout(#[from] FanoutError),
}

impl GatewayError {
    pub fn to_event(&self) -> PushEvent {
        let payload = ExceptionPayload {
            status: "error",
            message: self.to_string(),
        };
        PushEvent::new(
            EXCEPTION_EVENT,
            serde_json::to_value(payload).unwrap_or(Value::Null),
        )
    }
}

/// Parse a text frame
pub fn parse_frame(text: &str) -> Result<GatewayReceive, GatewayError> {
    serde_json::from_str(text).map_err(|e| GatewayError::InvalidFrame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_messages_frame() {
        let frame = parse_frame(
            r#"{"event":"messages","data":{"message":"hi","conversation_id":1,"user_id":2}}"#,
        )
        .unwrap();
        assert_eq!(frame.event, MESSAGES_EVENT);

        let payload: InboundMessage = serde_json::from_value(frame.data).unwrap();
        assert_eq!(payload.message, "hi");
        assert_eq!(payload.user_id, 2);
    }

    #[test]
    fn test_garbage_is_invalid_frame() {
        assert!(matches!(
            parse_frame("not json"),
            Err(GatewayError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_exception_event_shape() {
        let event = GatewayError::Unauthorized.to_event();
        assert_eq!(event.event, EXCEPTION_EVENT);
        assert_eq!(event.data, json!({ "status": "error", "message": "Unauthorized" }));
    }
}
