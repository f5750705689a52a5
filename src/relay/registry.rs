//! Pending request registry with bounded FIFO eviction.
//!
//! Maps each outstanding [`RequestId`] to the oneshot sender that completes
//! its [`ResponseWaiter`]. All mutation happens under one mutex; waiting
//! happens outside it, on the waiter's receiver.
//!
//! # Lifecycle
//!
//! ```text
//! register(id) ──► entry live ──┬── resolve(id, response)   value delivered
//!                               ├── waiter dropped          timeout / cancel / send failure
//!                               ├── evicted at capacity     waiter never resolves → Timeout
//!                               └── fail_all(err)           error delivered (disconnect)
//! ```
//!
//! Exactly one of these removes the entry. Later attempts find nothing and
//! are no-ops.

// Rust guideline compliant 2026-02

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use super::protocol::Response;
use super::request_id::RequestId;
use crate::error::RelayError;

/// Terminal value delivered to a waiter.
type Outcome = Result<Response, RelayError>;

/// A live registry entry.
#[derive(Debug)]
struct Entry {
    /// Insertion sequence, used for FIFO eviction and stale-removal checks.
    seq: u64,
    reply: oneshot::Sender<Outcome>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<RequestId, Entry>,
    /// Insertion order: seq → id. Mirrors `entries` exactly.
    order: BTreeMap<u64, RequestId>,
    next_seq: u64,
}

impl Inner {
    fn take(&mut self, id: RequestId) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }
}

/// Bounded, thread-safe map from request id to response waiter.
#[derive(Debug)]
pub struct PendingRequests {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl PendingRequests {
    /// Create a registry holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves `entries` and `order` consistent
        // before any call that could panic, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `id`.
    ///
    /// At capacity, the oldest-inserted entry is evicted first; its waiter is
    /// never resolved and its caller ends in [`RelayError::Timeout`]. If `id`
    /// is already live, the previous entry is discarded the same way.
    pub fn register(self: &Arc<Self>, id: RequestId) -> ResponseWaiter {
        let (reply, rx) = oneshot::channel();
        let mut inner = self.lock();

        if inner.take(id).is_some() {
            log::warn!("Request id {} registered twice, discarding older waiter", id);
        }

        while inner.entries.len() >= self.capacity {
            let Some((_, oldest)) = inner.order.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
            log::debug!("Pending registry full, evicted request {}", oldest);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, id);
        inner.entries.insert(id, Entry { seq, reply });
        drop(inner);

        ResponseWaiter {
            id,
            seq,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Deliver `response` to the waiter registered under `id`.
    ///
    /// Returns `false` (and does nothing else) if no entry is live for `id`,
    /// e.g. it already timed out, was evicted, or was never registered.
    pub fn resolve(&self, id: RequestId, response: Response) -> bool {
        let Some(entry) = self.lock().take(id) else {
            log::debug!("Dropping response for unknown request {}", id);
            return false;
        };
        if entry.reply.send(Ok(response)).is_err() {
            log::debug!("Waiter for request {} went away before delivery", id);
        }
        true
    }

    /// Remove the entry for `id` without delivering anything.
    pub fn remove(&self, id: RequestId) -> bool {
        self.lock().take(id).is_some()
    }

    /// Remove `id` only if it is still the entry inserted with `seq`.
    fn remove_exact(&self, id: RequestId, seq: u64) {
        let mut inner = self.lock();
        if inner.entries.get(&id).is_some_and(|e| e.seq == seq) {
            inner.take(id);
        }
    }

    /// Fail every outstanding request with `error`. Returns how many.
    pub fn fail_all(&self, error: &RelayError) -> usize {
        let drained: Vec<Entry> = {
            let mut inner = self.lock();
            inner.order.clear();
            inner.entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            // Receiver may already be gone; nothing to do then
            let _ = entry.reply.send(Err(error.clone()));
        }
        count
    }

    /// Whether `id` has a live entry.
    pub fn contains(&self, id: RequestId) -> bool {
        self.lock().entries.contains_key(&id)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of live entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Single-use handle resolving to one request's outcome.
///
/// Dropping the waiter (after [`wait`](Self::wait) returns, or when the
/// awaiting future is cancelled) removes its registry entry if it is still
/// live.
#[derive(Debug)]
pub struct ResponseWaiter {
    id: RequestId,
    seq: u64,
    rx: oneshot::Receiver<Outcome>,
    registry: Arc<PendingRequests>,
}

impl ResponseWaiter {
    /// Request id this waiter is registered under.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait up to `timeout` for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Timeout`] if nothing is delivered in time
    /// (including when the entry was evicted), or the error delivered by
    /// [`PendingRequests::fail_all`].
    pub async fn wait(mut self, timeout: Duration) -> Result<Response, RelayError> {
        let rx = &mut self.rx;
        let outcome = async move {
            match rx.await {
                Ok(outcome) => outcome,
                // Sender dropped without a value: evicted. Never resolves.
                Err(_) => std::future::pending().await,
            }
        };

        match tokio::time::timeout(timeout, outcome).await {
            Ok(outcome) => outcome,
            Err(_) => {
                log::debug!("Request {} timed out after {:?}", self.id, timeout);
                Err(RelayError::Timeout)
            }
        }
    }
}

impl Drop for ResponseWaiter {
    fn drop(&mut self) {
        self.registry.remove_exact(self.id, self.seq);
    }
}
