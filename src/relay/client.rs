//! Public request API over a [`Transport`].
//!
//! [`RelayClient`] is cheap to clone; every clone shares one id allocator,
//! one pending registry, and one event broadcaster.
//!
//! # Usage
//!
//! ```ignore
//! let transport = WsTransport::new(&config.relay_url, &[]);
//! let client = RelayClient::builder(transport).config(&config).build();
//! client.connect().await?;
//!
//! let mut events = client.subscribe_events();
//! if client.join_session(&session_id, &session_key).await? {
//!     while let Some(event) = events.recv().await {
//!         // handle Web3Request …
//!     }
//! }
//! ```
//!
//! # Request template
//!
//! All four requests run the same steps: allocate an id, register a
//! waiter, encode, send, then wait up to the request timeout. The waiter
//! removes its own registry entry when dropped, so every early return
//! (encode failure, send failure, timeout, cancellation) leaves the
//! registry clean.
//!
//! # Disconnects
//!
//! When the transport reports `Disconnected` or `Error`, every outstanding
//! request fails immediately with [`RelayError::ConnectionClosed`] instead
//! of waiting out its timeout.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::dispatcher::Dispatcher;
use super::events::{EventBroadcaster, EventSubscription};
use super::protocol::OutboundMessage;
use super::registry::PendingRequests;
use super::request_id::{RequestId, RequestIdAllocator};
use super::transport::{ConnectionState, Transport};
use crate::config::Config;
use crate::constants::{PENDING_REQUEST_CAPACITY, REQUEST_TIMEOUT};
use crate::error::RelayError;

#[derive(Debug)]
struct Shared<T> {
    transport: T,
    ids: RequestIdAllocator,
    registry: Arc<PendingRequests>,
    events: Arc<EventBroadcaster>,
    request_timeout: Duration,
}

/// Correlating client for the relay protocol.
#[derive(Debug)]
pub struct RelayClient<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for RelayClient<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Builder for [`RelayClient`].
#[derive(Debug)]
pub struct RelayClientBuilder<T> {
    transport: T,
    request_timeout: Duration,
    capacity: usize,
}

impl<T: Transport> RelayClientBuilder<T> {
    /// How long each request waits for its response.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Maximum number of outstanding requests before FIFO eviction.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Take timeout and capacity from `config`.
    #[must_use]
    pub fn config(self, config: &Config) -> Self {
        self.request_timeout(config.request_timeout())
            .capacity(config.registry_capacity)
    }

    /// Build the client and start its background tasks.
    ///
    /// Spawns the inbound dispatcher and the connection-state watcher on the
    /// current tokio runtime. Both exit when the transport is dropped.
    #[must_use]
    pub fn build(self) -> RelayClient<T> {
        let registry = PendingRequests::new(self.capacity);
        let events = Arc::new(EventBroadcaster::new());

        match self.transport.take_frames() {
            Some(frames) => {
                let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&events));
                tokio::spawn(dispatcher.run(frames));
            }
            None => log::warn!("Transport frames already taken; responses will not be routed"),
        }

        tokio::spawn(fail_pending_on_disconnect(
            self.transport.state_changes(),
            Arc::clone(&registry),
        ));

        RelayClient {
            shared: Arc::new(Shared {
                transport: self.transport,
                ids: RequestIdAllocator::new(),
                registry,
                events,
                request_timeout: self.request_timeout,
            }),
        }
    }
}

/// Fail every outstanding request whenever the transport goes down.
async fn fail_pending_on_disconnect(
    mut states: watch::Receiver<ConnectionState>,
    registry: Arc<PendingRequests>,
) {
    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();
        if state.is_down() {
            let failed = registry.fail_all(&RelayError::ConnectionClosed);
            if failed > 0 {
                log::warn!(
                    "Connection went down ({:?}), failed {} pending request(s)",
                    state,
                    failed
                );
            }
        }
    }
}

impl<T: Transport> RelayClient<T> {
    /// Start building a client over `transport`.
    pub fn builder(transport: T) -> RelayClientBuilder<T> {
        RelayClientBuilder {
            transport,
            request_timeout: REQUEST_TIMEOUT,
            capacity: PENDING_REQUEST_CAPACITY,
        }
    }

    /// Build a client with default timeout and capacity.
    pub fn new(transport: T) -> Self {
        Self::builder(transport).build()
    }

    /// Open the transport.
    pub async fn connect(&self) -> Result<(), RelayError> {
        self.shared.transport.connect().await
    }

    /// Close the transport. Outstanding requests fail with
    /// [`RelayError::ConnectionClosed`].
    pub async fn disconnect(&self) -> Result<(), RelayError> {
        self.shared.transport.disconnect().await
    }

    /// Join `session_id` with its shared key.
    ///
    /// Returns `Ok(true)` if the relay accepted, `Ok(false)` if it refused.
    pub async fn join_session(
        &self,
        session_id: &str,
        session_key: &str,
    ) -> Result<bool, RelayError> {
        self.request(|id| OutboundMessage::JoinSession {
            id,
            session_id: session_id.to_string(),
            session_key: session_key.to_string(),
        })
        .await
    }

    /// Store one metadata entry on the session.
    pub async fn set_metadata(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
    ) -> Result<bool, RelayError> {
        self.request(|id| OutboundMessage::SetMetadata {
            id,
            session_id: session_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })
        .await
    }

    /// Configure the session's webhook and metadata.
    pub async fn set_session_config(
        &self,
        session_id: &str,
        webhook_id: &str,
        webhook_url: &str,
        metadata: HashMap<String, String>,
    ) -> Result<bool, RelayError> {
        self.request(|id| OutboundMessage::SetSessionConfig {
            id,
            session_id: session_id.to_string(),
            webhook_id: webhook_id.to_string(),
            webhook_url: webhook_url.to_string(),
            metadata,
        })
        .await
    }

    /// Publish `event` with `data` to the host.
    ///
    /// `data` is sent as-is; encrypt it first if the session requires it.
    pub async fn publish_event(
        &self,
        session_id: &str,
        event: &str,
        data: HashMap<String, String>,
    ) -> Result<bool, RelayError> {
        self.request(|id| OutboundMessage::PublishEvent {
            id,
            session_id: session_id.to_string(),
            event: event.to_string(),
            data,
        })
        .await
    }

    async fn request(
        &self,
        build: impl FnOnce(RequestId) -> OutboundMessage,
    ) -> Result<bool, RelayError> {
        let shared = &self.shared;
        let id = shared.ids.next_id()?;
        let waiter = shared.registry.register(id);

        let message = build(id);
        let frame = message.to_frame()?;

        log::debug!("Sending {} (id {})", message.kind(), id);
        if let Err(e) = shared.transport.send_text(frame).await {
            log::warn!("Failed to send {} (id {}): {}", message.kind(), id, e);
            return Err(e);
        }

        let response = waiter.wait(shared.request_timeout).await?;
        log::debug!("{} (id {}) answered {:?}", message.kind(), id, response.status);
        Ok(response.is_ok())
    }

    /// Receive host events published from now on.
    pub fn subscribe_events(&self) -> EventSubscription {
        self.shared.events.subscribe()
    }

    /// Observe transport connection state.
    pub fn connection_states(&self) -> watch::Receiver<ConnectionState> {
        self.shared.transport.state_changes()
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.registry.len()
    }

    /// Whether `id` is still awaiting a response.
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.shared.registry.contains(id)
    }

    /// Most recently allocated request id, or 0 if none.
    pub fn last_request_id(&self) -> RequestId {
        self.shared.ids.last_issued()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }
}
