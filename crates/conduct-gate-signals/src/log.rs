// crates/conduct-gate-signals/src/log.rs
// ============================================================================
// Module: Behavioral Log
// Description: Per-agent sliding-window buffer of behavioral signals.
// Purpose: Retain the recent evidence stream behind meters and inferencers.
// Dependencies: conduct-gate-core
// ============================================================================

//! ## Overview
//! The behavioral log holds one agent's recent signals in append order.
//! Retention is a sliding time window: appends prune records older than the
//! horizon, so the log is bounded without a background task. Each log has a
//! single writer; cross-agent sharing happens via copied readings only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;

use conduct_gate_core::BehaviorSignal;
use conduct_gate_core::SignalRecord;
use conduct_gate_core::Timestamp;

// ============================================================================
// SECTION: Behavioral Log
// ============================================================================

/// Default retention window (24 hours).
pub const DEFAULT_RETENTION_MS: i64 = 24 * 60 * 60 * 1_000;

/// Per-agent sliding-window signal buffer.
///
/// # Invariants
/// - Records are kept in append order; pruning removes whole records from the
///   front only.
#[derive(Debug, Clone)]
pub struct BehaviorLog {
    /// Retained records, oldest first.
    records: VecDeque<SignalRecord>,
    /// Retention window in milliseconds.
    retention_ms: i64,
}

impl BehaviorLog {
    /// Creates an empty log with the given retention window.
    #[must_use]
    pub const fn new(retention_ms: i64) -> Self {
        Self {
            records: VecDeque::new(),
            retention_ms,
        }
    }

    /// Appends a signal observed at `now` and prunes expired records.
    pub fn append(&mut self, now: Timestamp, signal: BehaviorSignal) {
        self.records.push_back(SignalRecord {
            timestamp: now,
            signal,
        });
        self.prune(now);
    }

    /// Removes records older than the retention horizon relative to `now`.
    pub fn prune(&mut self, now: Timestamp) {
        let horizon = now.saturating_sub_millis(self.retention_ms);
        while let Some(front) = self.records.front() {
            if front.timestamp < horizon {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> impl Iterator<Item = &SignalRecord> {
        self.records.iter()
    }

    /// Returns records with timestamps in `[since, now]`, oldest first.
    #[must_use]
    pub fn records_since(&self, since: Timestamp) -> impl Iterator<Item = &SignalRecord> {
        self.records.iter().filter(move |record| record.timestamp >= since)
    }

    /// Returns the number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the retention window in milliseconds.
    #[must_use]
    pub const fn retention_ms(&self) -> i64 {
        self.retention_ms
    }
}
