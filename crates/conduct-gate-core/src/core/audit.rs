// crates/conduct-gate-core/src/core/audit.rs
// ============================================================================
// Module: Conduct Gate Audit Records
// Description: Gate results, trajectory entries, security events, interventions.
// Purpose: Capture deterministic admission history for replay and audit.
// Dependencies: crate::core::{constraint, identifiers, state, time}, serde, smallvec
// ============================================================================

//! ## Overview
//! Every gate call produces a [`GateResult`] and a trajectory entry; any call
//! that observed a violation additionally emits a [`SecurityEvent`]. Audit
//! records are append-only: once emitted they are never mutated, and the
//! trajectory store verifies stored digests on re-read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use crate::core::constraint::Severity;
use crate::core::identifiers::ActionRef;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::AttractorId;
use crate::core::identifiers::ConstraintId;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::EventId;
use crate::core::state::Dimension;
use crate::core::state::PhaseState;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Violations
// ============================================================================

/// A single observed constraint violation.
///
/// # Invariants
/// - `observed` and `required` refer to `dimension` at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Constraint that failed.
    pub constraint_id: ConstraintId,
    /// Severity of the failed constraint.
    pub severity: Severity,
    /// Primary dimension the violation concerns.
    pub dimension: Dimension,
    /// Observed value of the dimension.
    pub observed: f64,
    /// Value the constraint requires.
    pub required: f64,
}

/// Short violation list sized for the common one-or-two violation case.
pub type ViolationList = SmallVec<[ViolationRecord; 4]>;

// ============================================================================
// SECTION: Gate Outcomes
// ============================================================================

/// Closed admission outcome for a gate call.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// The candidate state satisfied the manifold unchanged.
    Allowed,
    /// Projection repaired the state; the corrected state is authoritative.
    AllowedWithCorrection,
    /// The action was refused.
    Blocked,
}

/// Machine-readable reason attached to a gate result.
///
/// # Invariants
/// - Variants are stable; user-visible text derives from these, never the
///   reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// State satisfied all constraints.
    Valid,
    /// State was repaired by projection.
    Corrected,
    /// State could not be repaired within the projection budget.
    ConstraintViolation,
    /// The latency budget was exhausted.
    Timeout,
    /// The audit write path refused the call.
    StorageUnavailable,
    /// An unexpected failure below the gate.
    Internal,
}

impl GateReason {
    /// Returns the single-line reason surfaced to end users.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Valid => "action admitted",
            Self::Corrected => "action admitted with correction",
            Self::ConstraintViolation => "action refused by policy",
            Self::Timeout => "action refused: evaluation timed out",
            Self::StorageUnavailable => "action refused: audit unavailable",
            Self::Internal => "action refused: internal error",
        }
    }
}

// ============================================================================
// SECTION: Interventions
// ============================================================================

/// Progressive intervention kinds, in escalation order.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterventionKind {
    /// Advisory warning only.
    Warn,
    /// Rate-limit the agent by the given factor in (0, 1].
    Throttle {
        /// Multiplier applied to the agent's permitted action rate.
        rate_limit_factor: f64,
    },
    /// Require out-of-band approval for high-impact actions.
    Supervise,
    /// Disable the declared capability set.
    Restrict {
        /// Capability names to disable.
        capabilities: Vec<String>,
    },
    /// Block the agent outright.
    Block,
}

/// Advisory intervention attached to a gate result.
///
/// # Invariants
/// - Interventions are advisory; the engine never executes them itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    /// Intervention kind and parameters.
    pub kind: InterventionKind,
    /// Attractor that motivated the intervention, when any.
    pub attractor_id: Option<AttractorId>,
    /// Issue timestamp.
    pub issued_at: Timestamp,
}

// ============================================================================
// SECTION: Gate Results
// ============================================================================

/// Result of a single gate call.
///
/// # Invariants
/// - `projected_state` is present iff `outcome` is `AllowedWithCorrection`.
/// - `residual_violations` is non-empty only for blocked constraint outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    /// Admission outcome.
    pub outcome: GateOutcome,
    /// Machine-readable reason.
    pub reason: GateReason,
    /// State composed for the call, when composition succeeded.
    pub state: Option<PhaseState>,
    /// Repaired state, when projection corrected the call.
    pub projected_state: Option<PhaseState>,
    /// Violations observed on the composed state.
    pub violations: ViolationList,
    /// Violations remaining after projection gave up.
    pub residual_violations: ViolationList,
    /// Security event recorded for the call, when any.
    pub security_event_id: Option<EventId>,
    /// Background intervention advised for the agent, when any.
    pub intervention: Option<Intervention>,
}

// ============================================================================
// SECTION: Trajectory Entries
// ============================================================================

/// How a gate call moved the agent's trajectory.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Clean admission; state recorded as composed.
    Steady,
    /// Projection corrected the state; the corrected state is recorded.
    Corrected,
    /// The action was blocked; the composed state is recorded.
    Rejected,
}

/// Per-agent trajectory entry.
///
/// # Invariants
/// - Entries are strictly time-ordered per agent; ties break by insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    /// Agent the entry belongs to.
    pub agent_id: AgentId,
    /// Entry timestamp.
    pub timestamp: Timestamp,
    /// Recorded state.
    pub state: PhaseState,
    /// Transition kind.
    pub transition: TransitionKind,
    /// Action the gate call evaluated.
    pub action_ref: ActionRef,
    /// Admission outcome of the call.
    pub outcome: GateOutcome,
    /// Identifiers of violated constraints, when any.
    pub violations: Vec<ConstraintId>,
}

// ============================================================================
// SECTION: Security Events
// ============================================================================

/// Append-only audit record emitted when a gate call observes a violation.
///
/// # Invariants
/// - Never mutated after emission; stores verify digests on re-read.
/// - `residual_violations` is empty when the call was corrected successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Agent the event concerns.
    pub agent_id: AgentId,
    /// Event timestamp.
    pub timestamp: Timestamp,
    /// State as composed, before any repair.
    pub original_state: Option<PhaseState>,
    /// Repaired state, when projection produced one.
    pub projected_state: Option<PhaseState>,
    /// Violations observed on the composed state.
    pub violations: ViolationList,
    /// Violations remaining after projection.
    pub residual_violations: ViolationList,
    /// Whether the action was ultimately admitted.
    pub allowed: bool,
    /// Machine-readable reason for the outcome.
    pub reason: GateReason,
    /// Whether the latency budget expired during the call.
    pub timed_out: bool,
    /// Whether the event records an unexpected internal failure.
    pub fatal: bool,
    /// Whether the composed state carried insufficient signal.
    pub low_confidence: bool,
    /// Internal failure detail; audit-only, never surfaced to end users.
    pub detail: Option<String>,
    /// Optional caller correlation identifier.
    pub correlation_id: Option<CorrelationId>,
}
