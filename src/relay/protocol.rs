//! Wire format for the relay protocol.
//!
//! Every frame is a JSON object discriminated by its `type` field.
//!
//! # Message Types
//!
//! - [`OutboundMessage`] - signer → relay requests, each carrying an `id`
//! - [`Inbound::Response`] - `OK` / `Fail`, correlated by `id`
//! - [`Inbound::Event`] - `Event`, unsolicited, pushed by the host
//!
//! # Wire Format
//!
//! ```text
//! → {"type":"JoinSession","id":1,"sessionId":"…","sessionKey":"…"}
//! ← {"type":"OK","id":1,"sessionId":"…"}
//! ← {"type":"Event","sessionId":"…","eventId":"…","event":"Web3Request","data":{…}}
//! ```
//!
//! Inbound parsing is deliberately shallow: only the tag and, for
//! responses, the correlation id are required.

// Rust guideline compliant 2026-02

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::request_id::RequestId;
use crate::error::RelayError;

/// Request sent from the signer to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Join a session using its shared key.
    #[serde(rename_all = "camelCase")]
    JoinSession {
        /// Correlation id.
        id: RequestId,
        /// Session to join.
        session_id: String,
        /// Session key proving membership.
        session_key: String,
    },
    /// Store a single metadata entry on the session.
    #[serde(rename_all = "camelCase")]
    SetMetadata {
        /// Correlation id.
        id: RequestId,
        /// Target session.
        session_id: String,
        /// Metadata key.
        key: String,
        /// Metadata value.
        value: String,
    },
    /// Configure the session's webhook and metadata.
    #[serde(rename_all = "camelCase")]
    SetSessionConfig {
        /// Correlation id.
        id: RequestId,
        /// Target session.
        session_id: String,
        /// Webhook identifier registered with the relay.
        webhook_id: String,
        /// URL the relay calls for offline delivery.
        webhook_url: String,
        /// Free-form session metadata.
        metadata: HashMap<String, String>,
    },
    /// Publish an event to the host.
    #[serde(rename_all = "camelCase")]
    PublishEvent {
        /// Correlation id.
        id: RequestId,
        /// Target session.
        session_id: String,
        /// Event name (e.g. `Web3Response`).
        event: String,
        /// Event payload, already encrypted by the caller where required.
        data: HashMap<String, String>,
    },
}

impl OutboundMessage {
    /// Correlation id carried by this message.
    pub fn id(&self) -> RequestId {
        match self {
            Self::JoinSession { id, .. }
            | Self::SetMetadata { id, .. }
            | Self::SetSessionConfig { id, .. }
            | Self::PublishEvent { id, .. } => *id,
        }
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinSession { .. } => "JoinSession",
            Self::SetMetadata { .. } => "SetMetadata",
            Self::SetSessionConfig { .. } => "SetSessionConfig",
            Self::PublishEvent { .. } => "PublishEvent",
        }
    }

    /// Encode as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Serialization`] if encoding fails.
    pub fn to_frame(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outcome reported by the relay for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// `{"type":"OK"}`
    Ok,
    /// `{"type":"Fail"}`
    Fail,
}

/// Correlated reply to an [`OutboundMessage`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Whether the relay accepted the request.
    pub status: ResponseStatus,
    /// Session the response refers to, when the relay includes it.
    pub session_id: Option<String>,
    /// The full decoded frame.
    pub payload: Value,
}

impl Response {
    /// Whether the request succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

/// Unsolicited event pushed by the host through the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    /// Session the event belongs to.
    pub session_id: String,
    /// Host-assigned event id.
    pub event_id: String,
    /// Event name (wire field `event`).
    pub event_name: String,
    /// Event payload (wire field `data`), `Null` when absent.
    pub payload: Value,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `OK` or `Fail` for one of our requests.
    Response(Response),
    /// Host-initiated event.
    Event(HostEvent),
}

impl Inbound {
    /// Decode and classify a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ProtocolViolation`] if the frame is not a JSON
    /// object, has no string `type`, has an unknown `type`, or is a response
    /// without an integer `id`.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let frame: Value = serde_json::from_str(text)
            .map_err(|e| RelayError::ProtocolViolation(format!("invalid JSON: {e}")))?;

        let Some(tag) = frame.get("type").and_then(Value::as_str) else {
            return Err(RelayError::ProtocolViolation(
                "missing or non-string type tag".to_string(),
            ));
        };

        match tag {
            "OK" => Self::response(ResponseStatus::Ok, frame),
            "Fail" => Self::response(ResponseStatus::Fail, frame),
            "Event" => Ok(Self::Event(HostEvent {
                session_id: string_field(&frame, "sessionId"),
                event_id: string_field(&frame, "eventId"),
                event_name: string_field(&frame, "event"),
                payload: frame.get("data").cloned().unwrap_or(Value::Null),
            })),
            other => Err(RelayError::ProtocolViolation(format!(
                "unknown message type: {other}"
            ))),
        }
    }

    fn response(status: ResponseStatus, frame: Value) -> Result<Self, RelayError> {
        let Some(id) = frame.get("id").and_then(Value::as_i64) else {
            return Err(RelayError::ProtocolViolation(
                "response without integer id".to_string(),
            ));
        };
        let session_id = frame
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self::Response(Response {
            id,
            status,
            session_id,
            payload: frame,
        }))
    }
}

/// Read a field as a string, accepting numbers too. Missing → empty.
fn string_field(frame: &Value, key: &str) -> String {
    match frame.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
