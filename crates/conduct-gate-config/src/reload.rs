// crates/conduct-gate-config/src/reload.rs
// ============================================================================
// Module: Reload Barrier
// Description: Epoch barrier draining in-flight gate calls before a swap.
// Purpose: Make configuration and manifold replacement atomic to callers.
// ============================================================================

//! ## Overview
//! Hot reload replaces the whole configuration (and manifold) at once. The
//! barrier makes that replacement safe: gate calls hold a guard for their
//! duration; a reload first parks new callers, then waits for in-flight
//! guards to drain, performs the swap, and releases the parked callers under
//! a new epoch. Gate calls are short and bounded, so the drain wait is too.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;

// ============================================================================
// SECTION: Barrier
// ============================================================================

/// Epoch barrier coordinating gate calls with configuration swaps.
///
/// # Invariants
/// - `epoch` only advances inside `finish`.
/// - While `reloading` is set, no new guard is issued.
#[derive(Debug, Default)]
pub struct ReloadBarrier {
    /// Number of gate calls currently in flight.
    in_flight: AtomicU64,
    /// Whether a reload is parked at the barrier.
    reloading: AtomicBool,
    /// Configuration epoch, advanced per completed reload.
    epoch: AtomicU64,
}

impl ReloadBarrier {
    /// Creates a barrier at epoch zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current configuration epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Enters the barrier for the duration of one gate call.
    ///
    /// Blocks briefly while a reload is parked at the barrier.
    pub fn enter(&self) -> CallGuard<'_> {
        loop {
            while self.reloading.load(Ordering::Acquire) {
                thread::yield_now();
            }
            self.in_flight.fetch_add(1, Ordering::AcqRel);
            // Re-check: a reload may have parked between the load and the
            // increment; back out and wait again if so.
            if self.reloading.load(Ordering::Acquire) {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                continue;
            }
            return CallGuard {
                barrier: self,
            };
        }
    }

    /// Parks new callers and waits for in-flight calls to drain.
    pub fn begin(&self) {
        self.reloading.store(true, Ordering::Release);
        while self.in_flight.load(Ordering::Acquire) > 0 {
            thread::yield_now();
        }
    }

    /// Completes the reload, advancing the epoch and releasing callers.
    pub fn finish(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.reloading.store(false, Ordering::Release);
    }

    /// Returns the number of calls currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// RAII guard for one in-flight gate call.
#[derive(Debug)]
pub struct CallGuard<'a> {
    /// Barrier the guard belongs to.
    barrier: &'a ReloadBarrier,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.barrier.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
