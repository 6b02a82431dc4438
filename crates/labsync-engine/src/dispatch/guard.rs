//! Dispatch reentrancy guard
//!
//! A single-slot in-flight marker. While a dispatch holds the permit, and for
//! a short window after it completes, further acquisitions fail and the
//! corresponding frames are dropped, never queued. Queuing would reorder
//! those frames relative to direct invocations; the drop-on-collision
//! semantics are intentional and collapse bursts of duplicate notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Gate allowing at most one in-flight dispatch
#[derive(Debug)]
pub struct DispatchGuard {
    in_flight: Arc<AtomicBool>,
    hold: Duration,
}

impl DispatchGuard {
    /// Create a guard whose permit keeps the slot held for `hold` after release
    #[must_use]
    pub fn new(hold: Duration) -> Self {
        Self {
            in_flight: Arc::new(AtomicBool::new(false)),
            hold,
        }
    }

    /// Try to take the single dispatch slot.
    ///
    /// Returns `None` while a dispatch is in flight or its guard window has
    /// not yet expired.
    pub fn try_acquire(&self) -> Option<DispatchPermit> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(DispatchPermit {
            in_flight: Arc::clone(&self.in_flight),
            hold: self.hold,
        })
    }

    /// Whether the slot is currently held
    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Permit for one dispatch; releasing is deferred by the guard window
#[derive(Debug)]
pub struct DispatchPermit {
    in_flight: Arc<AtomicBool>,
    hold: Duration,
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        let flag = Arc::clone(&self.in_flight);
        let hold = self.hold;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            flag.store(false, Ordering::SeqCst);
        });
    }
}
