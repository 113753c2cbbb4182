// crates/conduct-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Conduct Gate Interfaces
// Description: Backend-agnostic interfaces for composition, storage, and advice.
// Purpose: Define the contract surfaces used by the admission runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the admission gate integrates with signal
//! measurement, durable trajectory storage, and the intervention layer
//! without embedding backend-specific details. Implementations must be
//! deterministic and fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AgentId;
use crate::core::AttractorSnapshot;
use crate::core::EventId;
use crate::core::AuditDigest;
use crate::core::Intervention;
use crate::core::PhaseState;
use crate::core::SecurityEvent;
use crate::core::Timestamp;
use crate::core::TrajectoryEntry;

// ============================================================================
// SECTION: State Composer
// ============================================================================

/// Composite state produced by the measurement layer.
///
/// # Invariants
/// - `state` is always populated; when the behavioral log had no usable
///   samples, dimensions sit at the neutral midpoint with zero confidence and
///   `insufficient` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedState {
    /// Composed phase-space state.
    pub state: PhaseState,
    /// Whether every measured window was empty.
    pub insufficient: bool,
}

/// State composition errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Composition failed unexpectedly.
    #[error("state composition failed: {0}")]
    Internal(String),
}

/// Produces fresh composite states for agents on demand.
///
/// Implementations serialize composition per agent so trajectory timestamps
/// stay strictly monotonic, and bound staleness of any cached composite.
pub trait StateComposer {
    /// Composes a fresh state for the agent at the given time.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError`] when composition fails unexpectedly; missing
    /// signal data is not an error and yields a low-confidence state instead.
    fn compose(&self, agent_id: &AgentId, now: Timestamp) -> Result<ComposedState, ComposeError>;
}

impl<T: StateComposer + ?Sized> StateComposer for Arc<T> {
    fn compose(&self, agent_id: &AgentId, now: Timestamp) -> Result<ComposedState, ComposeError> {
        self.as_ref().compose(agent_id, now)
    }
}

// ============================================================================
// SECTION: Trajectory Store
// ============================================================================

/// Trajectory store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum TrajectoryStoreError {
    /// Store I/O error.
    #[error("trajectory store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails digest verification.
    #[error("trajectory store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("trajectory store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("trajectory store invalid data: {0}")]
    Invalid(String),
    /// An append would violate per-agent timestamp ordering.
    #[error("trajectory store out-of-order append for {agent_id}: {timestamp} < {latest}")]
    OutOfOrder {
        /// Agent whose ordering would break.
        agent_id: AgentId,
        /// Rejected entry timestamp.
        timestamp: Timestamp,
        /// Latest persisted timestamp for the agent.
        latest: Timestamp,
    },
    /// The bounded write queue is full; the caller should apply back-pressure
    /// policy.
    #[error("trajectory store overloaded: {message}")]
    Overloaded {
        /// Retryable overload message.
        message: String,
        /// Optional retry delay in milliseconds.
        retry_after_ms: Option<u64>,
    },
    /// Store reported an error.
    #[error("trajectory store error: {0}")]
    Store(String),
}

/// Filter for security event reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEventFilter {
    /// Restrict to a single agent.
    pub agent_id: Option<AgentId>,
    /// Inclusive window start.
    pub since: Option<Timestamp>,
    /// Exclusive window end.
    pub until: Option<Timestamp>,
    /// Restrict to events whose action was blocked.
    pub blocked_only: bool,
}

/// Security event as persisted, with its integrity digest.
///
/// # Invariants
/// - `digest` was sealed over the event's canonical bytes; reads verify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEventRecord {
    /// Store-assigned event identifier.
    pub event_id: EventId,
    /// Persisted event.
    pub event: SecurityEvent,
    /// Audit digest stored at append time.
    pub digest: AuditDigest,
}

/// Fixed-width trajectory window used by attractor discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryWindow {
    /// Agent the window belongs to.
    pub agent_id: AgentId,
    /// Consecutive states, oldest first; length equals the window size.
    pub states: Vec<PhaseState>,
}

/// Ordered, append-only per-agent trajectory and audit persistence.
///
/// Implementations must keep per-agent entries strictly time-ordered, keep
/// security events immutable after emission, and expose snapshot-consistent
/// reads.
pub trait TrajectoryStore {
    /// Appends a trajectory entry.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the write fails, would violate
    /// per-agent ordering, or the write queue is saturated.
    fn append_entry(&self, entry: &TrajectoryEntry) -> Result<(), TrajectoryStoreError>;

    /// Appends a security event and returns its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the write fails or the write
    /// queue is saturated.
    fn append_security_event(&self, event: &SecurityEvent)
    -> Result<EventId, TrajectoryStoreError>;

    /// Returns the agent's entries with `since <= timestamp < until`.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the read fails.
    fn window(
        &self,
        agent_id: &AgentId,
        since: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<TrajectoryEntry>, TrajectoryStoreError>;

    /// Returns sliding windows of `window_size` consecutive states per agent.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the read fails.
    fn all_trajectories(
        &self,
        window_size: usize,
    ) -> Result<Vec<TrajectoryWindow>, TrajectoryStoreError>;

    /// Returns security events matching the filter, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the read fails or a stored
    /// digest does not verify.
    fn security_events(
        &self,
        filter: &SecurityEventFilter,
    ) -> Result<Vec<SecurityEventRecord>, TrajectoryStoreError>;

    /// Persists an attractor snapshot under its generation number.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the write fails or the snapshot
    /// generation is not monotonic.
    fn publish_snapshot(&self, snapshot: &AttractorSnapshot)
    -> Result<(), TrajectoryStoreError>;

    /// Returns the most recent persisted attractor snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the read fails or the snapshot
    /// was written by a future format version.
    fn latest_snapshot(&self) -> Result<Option<AttractorSnapshot>, TrajectoryStoreError>;

    /// Deletes trajectory entries and security events strictly below the
    /// horizon and returns the number of deleted records.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when deletion fails.
    fn gc(&self, horizon: Timestamp) -> Result<u64, TrajectoryStoreError>;

    /// Exports trajectories and security events as JSON lines.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the read or serialization fails.
    fn export_jsonl(&self) -> Result<Vec<String>, TrajectoryStoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryStoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), TrajectoryStoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared trajectory store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedTrajectoryStore {
    /// Inner store implementation.
    inner: Arc<dyn TrajectoryStore + Send + Sync>,
}

impl SharedTrajectoryStore {
    /// Wraps a trajectory store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl TrajectoryStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn TrajectoryStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl TrajectoryStore for SharedTrajectoryStore {
    fn append_entry(&self, entry: &TrajectoryEntry) -> Result<(), TrajectoryStoreError> {
        self.inner.append_entry(entry)
    }

    fn append_security_event(
        &self,
        event: &SecurityEvent,
    ) -> Result<EventId, TrajectoryStoreError> {
        self.inner.append_security_event(event)
    }

    fn window(
        &self,
        agent_id: &AgentId,
        since: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<TrajectoryEntry>, TrajectoryStoreError> {
        self.inner.window(agent_id, since, until)
    }

    fn all_trajectories(
        &self,
        window_size: usize,
    ) -> Result<Vec<TrajectoryWindow>, TrajectoryStoreError> {
        self.inner.all_trajectories(window_size)
    }

    fn security_events(
        &self,
        filter: &SecurityEventFilter,
    ) -> Result<Vec<SecurityEventRecord>, TrajectoryStoreError> {
        self.inner.security_events(filter)
    }

    fn publish_snapshot(
        &self,
        snapshot: &AttractorSnapshot,
    ) -> Result<(), TrajectoryStoreError> {
        self.inner.publish_snapshot(snapshot)
    }

    fn latest_snapshot(&self) -> Result<Option<AttractorSnapshot>, TrajectoryStoreError> {
        self.inner.latest_snapshot()
    }

    fn gc(&self, horizon: Timestamp) -> Result<u64, TrajectoryStoreError> {
        self.inner.gc(horizon)
    }

    fn export_jsonl(&self) -> Result<Vec<String>, TrajectoryStoreError> {
        self.inner.export_jsonl()
    }

    fn readiness(&self) -> Result<(), TrajectoryStoreError> {
        self.inner.readiness()
    }
}

// ============================================================================
// SECTION: Intervention Advisor
// ============================================================================

/// Intervention advisor errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Advisor reported an error.
    #[error("intervention advisor error: {0}")]
    Internal(String),
}

/// Advises at most one background intervention per gate call.
///
/// Advice is consulted after the admission decision is final and never
/// influences the current call's outcome.
pub trait InterventionAdvisor {
    /// Returns the intervention advised for the agent, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError`] when advice cannot be computed; the gate
    /// treats this as "no intervention" and counts the failure.
    fn advise(
        &self,
        agent_id: &AgentId,
        state: &PhaseState,
        residual_violations: usize,
        now: Timestamp,
    ) -> Result<Option<Intervention>, AdvisorError>;
}

impl<T: InterventionAdvisor + ?Sized> InterventionAdvisor for Arc<T> {
    fn advise(
        &self,
        agent_id: &AgentId,
        state: &PhaseState,
        residual_violations: usize,
        now: Timestamp,
    ) -> Result<Option<Intervention>, AdvisorError> {
        self.as_ref().advise(agent_id, state, residual_violations, now)
    }
}

/// Advisor that never recommends an intervention.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAdvisor;

impl InterventionAdvisor for NullAdvisor {
    fn advise(
        &self,
        _agent_id: &AgentId,
        _state: &PhaseState,
        _residual_violations: usize,
        _now: Timestamp,
    ) -> Result<Option<Intervention>, AdvisorError> {
        Ok(None)
    }
}
