// crates/conduct-gate-core/src/core/outcome.rs
// ============================================================================
// Module: Conduct Gate Outcome Feedback
// Description: Ground-truth feedback records for classification and calibration.
// Purpose: Provide the clamped outcome record consumed by dynamics and calibration.
// Dependencies: crate::core::{identifiers, state, time}, serde
// ============================================================================

//! ## Overview
//! Outcome feedback ties a gated action to its observed result: task
//! effectiveness, resource cost, user sentiment, and incident count. The
//! attractor classifier and the calibration monitor are its only consumers;
//! feedback never alters a gate decision retroactively.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActionRef;
use crate::core::identifiers::AgentId;
use crate::core::state::PhaseState;
use crate::core::state::clamp_signed_unit;
use crate::core::state::clamp_unit;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Outcome Feedback
// ============================================================================

/// Observed outcome for a previously gated action.
///
/// # Invariants
/// - `effectiveness`, `resource`, `task_complexity`, and `urgency` are in [0, 1].
/// - `user_feedback` is in [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeFeedback {
    /// Action the feedback describes.
    pub action_ref: ActionRef,
    /// Agent that performed the action.
    pub agent_id: AgentId,
    /// State composed at decision time.
    pub state_at_action: PhaseState,
    /// Observed task effectiveness.
    pub effectiveness: f64,
    /// Observed normalized resource cost.
    pub resource: f64,
    /// Aggregated user sentiment.
    pub user_feedback: f64,
    /// Number of security events attributed to the action.
    pub security_events: u32,
    /// Normalized task complexity used for cost discounting.
    pub task_complexity: f64,
    /// Normalized urgency used for cost discounting.
    pub urgency: f64,
    /// Feedback timestamp.
    pub timestamp: Timestamp,
}

impl OutcomeFeedback {
    /// Creates feedback with all scalars clamped into their domains.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Record constructor mirrors the wire form.")]
    pub fn new(
        action_ref: ActionRef,
        agent_id: AgentId,
        state_at_action: PhaseState,
        effectiveness: f64,
        resource: f64,
        user_feedback: f64,
        security_events: u32,
        task_complexity: f64,
        urgency: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            action_ref,
            agent_id,
            state_at_action,
            effectiveness: clamp_unit(effectiveness),
            resource: clamp_unit(resource),
            user_feedback: clamp_signed_unit(user_feedback),
            security_events,
            task_complexity: clamp_unit(task_complexity),
            urgency: clamp_unit(urgency),
            timestamp,
        }
    }

    /// Returns the complexity- and urgency-discounted cost used by classification.
    ///
    /// `adjusted_cost = resource × (1 − 0.5·complexity − 0.3·urgency)`, clamped
    /// into [0, 1].
    #[must_use]
    pub fn adjusted_cost(&self) -> f64 {
        let discount = 1.0 - 0.5 * self.task_complexity - 0.3 * self.urgency;
        clamp_unit(self.resource * discount)
    }
}
