//! Request id allocation.
//!
//! Ids are `i64`, start at 1, and only ever increase for the lifetime of the
//! allocator. The counter is not reset on reconnect. Reaching `i64::MAX`
//! refuses further allocation instead of wrapping, so an id can never be
//! reissued while an older request with the same id might still be live.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::RelayError;

/// Correlation identifier carried by every outbound request.
pub type RequestId = i64;

/// Lock-free, monotonically increasing id source.
#[derive(Debug)]
pub struct RequestIdAllocator {
    /// Last id handed out (0 = none yet).
    last: AtomicI64,
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdAllocator {
    /// Create an allocator whose first id is 1.
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// Create an allocator whose next id is `last + 1`.
    pub fn starting_after(last: RequestId) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }

    /// Issue the next id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RequestIdsExhausted`] once `i64::MAX` has been
    /// issued. The allocator stays exhausted afterwards.
    pub fn next_id(&self) -> Result<RequestId, RelayError> {
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                last.checked_add(1)
            })
            .map(|previous| previous + 1)
            .or(Err(RelayError::RequestIdsExhausted))
    }

    /// Last id handed out, or 0 if none.
    pub fn last_issued(&self) -> RequestId {
        self.last.load(Ordering::Acquire)
    }
}
