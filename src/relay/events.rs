//! Host event fan-out.
//!
//! Every subscriber owns an unbounded queue, so a slow subscriber never
//! blocks the dispatcher or other subscribers, and no event is dropped for
//! lag. Subscribers see events published after they subscribed; there is
//! no replay.
//!
//! ```text
//! Dispatcher ──publish()──► EventBroadcaster ──┬──► EventSubscription (wallet UI)
//!                                              ├──► EventSubscription (request handler)
//!                                              └──► …
//! ```

// Rust guideline compliant 2026-02

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use super::protocol::HostEvent;

/// Multicast of [`HostEvent`]s to any number of subscribers.
#[derive(Debug, Default)]
pub struct EventBroadcaster {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<HostEvent>>>,
}

impl EventBroadcaster {
    /// Create a broadcaster with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving events published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        EventSubscription { rx }
    }

    /// Deliver `event` to every live subscriber. Returns how many received it.
    ///
    /// Subscribers that have gone away are pruned.
    pub fn publish(&self, event: &HostEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Number of subscribers that have not yet been pruned.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

/// Receiving end of an [`EventBroadcaster`] subscription.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct EventSubscription {
    rx: mpsc::UnboundedReceiver<HostEvent>,
}

impl EventSubscription {
    /// Wait for the next event. Returns `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<HostEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<HostEvent> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving. Queued events are discarded.
    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> HostEvent {
        HostEvent {
            session_id: "session".into(),
            event_id: id.into(),
            event_name: "Web3Request".into(),
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let broadcaster = EventBroadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        assert_eq!(broadcaster.publish(&event("1")), 2);

        assert_eq!(a.recv().await.unwrap().event_id, "1");
        assert_eq!(b.recv().await.unwrap().event_id, "1");
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let broadcaster = EventBroadcaster::new();
        let mut early = broadcaster.subscribe();
        broadcaster.publish(&event("1"));

        let mut late = broadcaster.subscribe();
        broadcaster.publish(&event("2"));

        assert_eq!(early.recv().await.unwrap().event_id, "1");
        assert_eq!(early.recv().await.unwrap().event_id, "2");
        assert_eq!(late.recv().await.unwrap().event_id, "2");
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_does_not_affect_others() {
        let broadcaster = EventBroadcaster::new();
        let gone = broadcaster.subscribe();
        let dropped = broadcaster.subscribe();
        let mut stays = broadcaster.subscribe();

        gone.unsubscribe();
        drop(dropped);

        assert_eq!(broadcaster.publish(&event("1")), 1);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(stays.recv().await.unwrap().event_id, "1");
    }

    #[tokio::test]
    async fn test_unread_subscriber_does_not_block_publish() {
        let broadcaster = EventBroadcaster::new();
        let _idle = broadcaster.subscribe();
        let mut active = broadcaster.subscribe();

        for i in 0..10_000 {
            broadcaster.publish(&event(&i.to_string()));
        }
        assert_eq!(active.recv().await.unwrap().event_id, "0");
    }

    #[tokio::test]
    async fn test_recv_ends_when_broadcaster_dropped() {
        let broadcaster = EventBroadcaster::new();
        let mut sub = broadcaster.subscribe();
        drop(broadcaster);
        assert!(sub.recv().await.is_none());
    }
}
