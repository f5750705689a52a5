//! Protocol-wide constants for the relay client.
//!
//! Centralizes the magic numbers shared by the registry, the request
//! template, and configuration defaults.

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// How long a request waits for its correlated response.
///
/// The relay forwards to the host and back, so this covers two network hops
/// plus host processing. Expiry surfaces as `RelayError::Timeout`.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Registry
// ============================================================================

/// Maximum number of outstanding requests held by the pending registry.
///
/// Registering past this evicts the oldest entry; its caller times out.
pub const PENDING_REQUEST_CAPACITY: usize = 300;

// ============================================================================
// Server
// ============================================================================

/// Default relay endpoint.
pub const DEFAULT_RELAY_URL: &str = "wss://relay.example.com/ws";
