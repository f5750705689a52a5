//! Request/response correlation over the relay connection.
//!
//! # Architecture
//!
//! ```text
//!  callers ──► RelayClient ──┬─ RequestIdAllocator   next id
//!                            ├─ PendingRequests       id → ResponseWaiter (bounded, FIFO)
//!                            └─ Transport::send_text
//!
//!  Transport frames ──► Dispatcher task ──┬─ OK / Fail ─► PendingRequests::resolve
//!                                         └─ Event ─────► EventBroadcaster ─► subscribers
//!
//!  Transport state ──► watcher task ── down ─► PendingRequests::fail_all
//! ```
//!
//! # Modules
//!
//! - [`client`] - public request API
//! - [`dispatcher`] - inbound classification and routing
//! - [`events`] - host event fan-out
//! - [`protocol`] - wire types
//! - [`registry`] - pending request registry and waiters
//! - [`request_id`] - id allocation
//! - [`transport`] - transport contract

pub mod client;
pub mod dispatcher;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod request_id;
pub mod transport;

pub use client::{RelayClient, RelayClientBuilder};
pub use dispatcher::{Dispatched, Dispatcher};
pub use events::{EventBroadcaster, EventSubscription};
pub use protocol::{HostEvent, Inbound, OutboundMessage, Response, ResponseStatus};
pub use registry::{PendingRequests, ResponseWaiter};
pub use request_id::{RequestId, RequestIdAllocator};
pub use transport::{ConnectionState, FrameReceiver, Transport};
