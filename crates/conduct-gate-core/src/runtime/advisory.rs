// crates/conduct-gate-core/src/runtime/advisory.rs
// ============================================================================
// Module: Conduct Gate Intervention Policy
// Description: Tenure-based escalation ladder for background interventions.
// Purpose: Map attractor classification and tenure to at most one intervention.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The intervention policy is a pure mapping: given the classification of the
//! attractor an agent currently inhabits, the agent's tenure inside it, and
//! the residual violations of the current call, it yields at most one
//! advisory intervention. Escalation is monotone in tenure:
//! throttle, then supervise, then restrict, then block. Interventions are
//! advisory; the orchestrator executes them, never this engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::AttractorClassification;
use crate::core::InterventionKind;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Escalation thresholds and parameters for interventions.
///
/// # Invariants
/// - `throttle_tenure_ms < supervise_tenure_ms < restrict_tenure_ms`.
/// - `throttle_rate_factor` is in (0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionPolicy {
    /// Tenure (ms) at which throttling escalates to supervision.
    pub supervise_tenure_ms: i64,
    /// Tenure (ms) at which supervision escalates to capability restriction.
    pub restrict_tenure_ms: i64,
    /// Tenure (ms) at which restriction escalates to a block.
    pub block_tenure_ms: i64,
    /// Rate-limit multiplier applied while throttled.
    pub throttle_rate_factor: f64,
    /// Capability names disabled by a restrict intervention.
    pub restricted_capabilities: Vec<String>,
}

impl Default for InterventionPolicy {
    fn default() -> Self {
        Self {
            supervise_tenure_ms: 300_000,
            restrict_tenure_ms: 1_800_000,
            block_tenure_ms: 7_200_000,
            throttle_rate_factor: 0.5,
            restricted_capabilities: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Decides the intervention for an agent's current basin, if any.
///
/// `classification` is `None` when the agent sits in no attractor. Tenure is
/// measured from the first gate call that resolved the agent into the
/// attractor's basin.
#[must_use]
pub fn decide_intervention(
    policy: &InterventionPolicy,
    classification: Option<AttractorClassification>,
    kill_switch: bool,
    tenure_ms: i64,
    residual_violations: usize,
) -> Option<InterventionKind> {
    match classification? {
        AttractorClassification::Beneficial => None,
        AttractorClassification::Neutral => {
            if residual_violations > 0 {
                Some(InterventionKind::Warn)
            } else {
                None
            }
        }
        AttractorClassification::Detrimental => {
            if kill_switch || tenure_ms >= policy.block_tenure_ms {
                Some(InterventionKind::Block)
            } else if tenure_ms >= policy.restrict_tenure_ms {
                Some(InterventionKind::Restrict {
                    capabilities: policy.restricted_capabilities.clone(),
                })
            } else if tenure_ms >= policy.supervise_tenure_ms {
                Some(InterventionKind::Supervise)
            } else {
                Some(InterventionKind::Throttle {
                    rate_limit_factor: policy.throttle_rate_factor,
                })
            }
        }
    }
}
