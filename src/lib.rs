//! Signer relay client - correlated requests and host events over a relay.
//!
//! A signer talks to a third-party host through a relay over one
//! persistent WebSocket. This crate issues typed requests over that socket
//! and matches each one to its `OK` / `Fail` reply by id. Unsolicited host
//! events on the same socket are fanned out to subscribers.
//!
//! # Architecture
//!
//! - **RelayClient** - public API: join session, set metadata, set session
//!   config, publish event
//! - **PendingRequests** - bounded registry of in-flight requests
//! - **Dispatcher** - classifies inbound frames as responses or events
//! - **EventBroadcaster** - multicast of host events
//! - **WsTransport** - WebSocket transport (tokio-tungstenite)
//!
//! # Modules
//!
//! - [`relay`] - correlation core
//! - [`ws`] - WebSocket transport
//! - [`config`] - configuration loading/saving
//! - [`error`] - error types

pub mod config;
pub mod constants;
pub mod error;
pub mod relay;
pub mod ws;

// Re-export commonly used types
pub use config::Config;
pub use error::RelayError;
pub use relay::{
    ConnectionState, EventSubscription, HostEvent, RelayClient, RequestId, Transport,
};
pub use ws::WsTransport;
