//! Error types for relay requests.
//!
//! Per-request failures surface only on that request's own result. Inbound
//! protocol violations are reported through the same type so the dispatcher
//! can log them, but they never reach a caller.

// Rust guideline compliant 2026-02

/// Errors that can occur while talking to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Outbound message could not be encoded.
    Serialization(String),
    /// Transport failed to connect, send, or disconnect.
    Transport(String),
    /// No matching response arrived within the request timeout.
    Timeout,
    /// Inbound frame was malformed or carried an unknown tag.
    ProtocolViolation(String),
    /// Transport went away while the request was outstanding.
    ConnectionClosed,
    /// Request id counter reached its maximum value.
    RequestIdsExhausted,
}

impl RelayError {
    /// Whether this is a timeout, as opposed to a transport-level failure.
    ///
    /// Callers typically retry timeouts but surface transport errors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {msg}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::RequestIdsExhausted => write!(f, "Request id space exhausted"),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinct_from_transport() {
        assert!(RelayError::Timeout.is_timeout());
        assert!(!RelayError::Transport("reset".into()).is_timeout());
        assert!(!RelayError::ConnectionClosed.is_timeout());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(RelayError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            RelayError::Transport("broken pipe".into()).to_string(),
            "Transport error: broken pipe"
        );
        assert_eq!(
            RelayError::ProtocolViolation("missing id".into()).to_string(),
            "Protocol violation: missing id"
        );
    }
}
