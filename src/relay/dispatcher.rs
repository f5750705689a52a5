//! Inbound frame classification and routing.
//!
//! The transport's read loop only enqueues raw frames. [`Dispatcher::run`]
//! drains that queue on its own task, so neither parsing nor event fan-out
//! ever holds up socket reads.
//!
//! ```text
//! transport read loop ──frames──► Dispatcher::run
//!                                    ├── OK / Fail ──► PendingRequests::resolve
//!                                    ├── Event ──────► EventBroadcaster::publish
//!                                    └── anything else: warn + drop
//! ```

// Rust guideline compliant 2026-02

use std::sync::Arc;

use super::events::EventBroadcaster;
use super::protocol::Inbound;
use super::registry::PendingRequests;
use super::request_id::RequestId;
use super::transport::FrameReceiver;
use crate::error::RelayError;

/// What happened to a successfully classified frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Response delivered to its waiter.
    Resolved(RequestId),
    /// Response for an id with no live entry; dropped.
    Unmatched(RequestId),
    /// Event published to this many subscribers.
    Event {
        /// Subscribers that received the event.
        subscribers: usize,
    },
}

/// Routes inbound frames to the registry or the event broadcaster.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<PendingRequests>,
    events: Arc<EventBroadcaster>,
}

impl Dispatcher {
    /// Create a dispatcher over shared registry and broadcaster.
    pub fn new(registry: Arc<PendingRequests>, events: Arc<EventBroadcaster>) -> Self {
        Self { registry, events }
    }

    /// Classify and route one frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ProtocolViolation`] for frames that cannot be
    /// classified. The frame has been dropped; the connection is unaffected.
    pub fn dispatch(&self, frame: &str) -> Result<Dispatched, RelayError> {
        match Inbound::parse(frame)? {
            Inbound::Response(response) => {
                let id = response.id;
                if self.registry.resolve(id, response) {
                    Ok(Dispatched::Resolved(id))
                } else {
                    Ok(Dispatched::Unmatched(id))
                }
            }
            Inbound::Event(event) => {
                log::debug!(
                    "Host event {} ({}) for session {}",
                    event.event_name,
                    event.event_id,
                    event.session_id
                );
                let subscribers = self.events.publish(&event);
                Ok(Dispatched::Event { subscribers })
            }
        }
    }

    /// Dispatch every frame until the stream closes.
    pub async fn run(self, mut frames: FrameReceiver) {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = self.dispatch(&frame) {
                log::warn!("Dropping inbound frame ({} bytes): {}", frame.len(), e);
            }
        }
        log::info!("Inbound frame stream closed, dispatcher exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn dispatcher() -> (Dispatcher, Arc<PendingRequests>, Arc<EventBroadcaster>) {
        let registry = PendingRequests::new(300);
        let events = Arc::new(EventBroadcaster::new());
        (
            Dispatcher::new(Arc::clone(&registry), Arc::clone(&events)),
            registry,
            events,
        )
    }

    #[tokio::test]
    async fn test_response_resolves_waiter() {
        let (dispatcher, registry, _) = dispatcher();
        let waiter = registry.register(7);

        assert_eq!(
            dispatcher.dispatch(r#"{"type":"OK","id":7}"#),
            Ok(Dispatched::Resolved(7))
        );
        let response = waiter.wait(Duration::from_secs(1)).await.unwrap();
        assert!(response.is_ok());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_response_is_dropped() {
        let (dispatcher, registry, _) = dispatcher();
        let _waiter = registry.register(1);

        assert_eq!(
            dispatcher.dispatch(r#"{"type":"Fail","id":2}"#),
            Ok(Dispatched::Unmatched(2))
        );
        assert!(registry.contains(1));
    }

    #[tokio::test]
    async fn test_event_is_broadcast() {
        let (dispatcher, registry, events) = dispatcher();
        let mut sub = events.subscribe();

        let frame = r#"{"type":"Event","sessionId":"s","eventId":"e","event":"Web3Request","data":{}}"#;
        assert_eq!(
            dispatcher.dispatch(frame),
            Ok(Dispatched::Event { subscribers: 1 })
        );
        assert_eq!(sub.recv().await.unwrap().event_name, "Web3Request");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_protocol_violations_are_reported() {
        let (dispatcher, _, _) = dispatcher();
        assert!(matches!(
            dispatcher.dispatch(r#"{"type":"Nope"}"#),
            Err(RelayError::ProtocolViolation(_))
        ));
        assert!(matches!(
            dispatcher.dispatch(r#"{"type":"OK"}"#),
            Err(RelayError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_run_survives_bad_frames() {
        let (dispatcher, registry, _) = dispatcher();
        let waiter = registry.register(4);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatcher.run(rx));

        tx.send("garbage".to_string()).unwrap();
        tx.send(r#"{"type":"Mystery","id":4}"#.to_string()).unwrap();
        tx.send(r#"{"type":"OK","id":4}"#.to_string()).unwrap();

        let response = waiter.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(response.id, 4);

        drop(tx);
        task.await.unwrap();
    }
}
