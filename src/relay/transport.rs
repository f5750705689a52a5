//! Transport contract consumed by the relay client.
//!
//! The client never opens sockets itself. Anything that can send a text
//! frame, hand over a stream of received text frames, and report its
//! connection state can carry the protocol. [`crate::ws::WsTransport`] is
//! the production implementation.
//!
//! Implementations must not reconnect or retry on their own behalf; state
//! changes are reported and the layer above decides what to do.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::RelayError;

/// Stream of inbound text frames, in arrival order.
pub type FrameReceiver = mpsc::UnboundedReceiver<String>;

/// Connection state reported by a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Connected and ready.
    Connected,
    /// Connection failed or was lost with an error.
    Error(String),
}

impl ConnectionState {
    /// Whether requests can currently be sent.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the connection has ended, cleanly or not.
    pub fn is_down(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error(_))
    }
}

/// A bidirectional text-frame channel to the relay.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if the connection cannot be opened.
    async fn connect(&self) -> Result<(), RelayError>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if closing fails.
    async fn disconnect(&self) -> Result<(), RelayError>;

    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if the frame could not be written.
    async fn send_text(&self, text: String) -> Result<(), RelayError>;

    /// Take the inbound frame stream. Returns `None` after the first call.
    fn take_frames(&self) -> Option<FrameReceiver>;

    /// Observe connection state transitions.
    fn state_changes(&self) -> watch::Receiver<ConnectionState>;
}
