// crates/conduct-gate-core/src/core/signal.rs
// ============================================================================
// Module: Conduct Gate Behavioral Signals
// Description: Canonical records for the per-agent behavioral log.
// Purpose: Provide stable, clamped signal records for meters and inferencers.
// Dependencies: crate::core::{identifiers, state, time}, serde
// ============================================================================

//! ## Overview
//! Behavioral signals are the raw evidence stream behind every composed
//! state: action events feed the operational meter, while claims,
//! commitments, collaborations, credit-seeking, and comprehension events
//! feed the virtue inferencer. All scalar payloads are clamped on ingress.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActionRef;
use crate::core::identifiers::AgentId;
use crate::core::state::clamp_unit;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Action Events
// ============================================================================

/// Outcome of a completed action, when known.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The action completed its task successfully.
    Success,
    /// The action completed but failed its task.
    Failure,
}

/// Action event consumed by the operational meter.
///
/// # Invariants
/// - `benefit_self`, `benefit_other`, and `cost` are in [0, 1] after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Action kind tag supplied by the orchestrator.
    pub kind: String,
    /// Task outcome, when the orchestrator reported one.
    pub outcome: Option<ActionOutcome>,
    /// Normalized benefit accruing to the acting agent.
    pub benefit_self: f64,
    /// Normalized benefit accruing to other agents.
    pub benefit_other: f64,
    /// Agents referenced by the action.
    pub peers: Vec<AgentId>,
    /// Normalized compute/API cost of the action.
    pub cost: f64,
    /// Whether the action raised an internal error.
    pub error: bool,
}

impl ActionEvent {
    /// Creates an action event with clamped scalar payloads.
    #[must_use]
    pub fn new(kind: impl Into<String>, benefit_self: f64, benefit_other: f64) -> Self {
        Self {
            kind: kind.into(),
            outcome: None,
            benefit_self: clamp_unit(benefit_self),
            benefit_other: clamp_unit(benefit_other),
            peers: Vec::new(),
            cost: 0.0,
            error: false,
        }
    }

    /// Returns a copy with the given task outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: ActionOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Returns a copy with the given referenced peers.
    #[must_use]
    pub fn with_peers(mut self, peers: Vec<AgentId>) -> Self {
        self.peers = peers;
        self
    }

    /// Returns a copy with the given clamped cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = clamp_unit(cost);
        self
    }

    /// Returns a copy flagged as an internal error.
    #[must_use]
    pub const fn with_error(mut self) -> Self {
        self.error = true;
        self
    }
}

// ============================================================================
// SECTION: Behavioral Signals
// ============================================================================

/// A single behavioral observation about an agent.
///
/// # Invariants
/// - Scalar payloads are clamped into [0, 1] at construction boundaries.
/// - Variants are stable for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorSignal {
    /// An action event.
    Action(ActionEvent),
    /// A factual claim made by the agent.
    Claim {
        /// Reference to the claim artifact.
        claim_ref: ActionRef,
        /// Whether the claim was verified.
        verified: bool,
    },
    /// A commitment made by the agent.
    Commitment {
        /// Reference to the commitment artifact.
        commitment_ref: ActionRef,
        /// Whether the commitment was fulfilled.
        fulfilled: bool,
    },
    /// A collaboration episode with other agents.
    Collaboration {
        /// Participating peers.
        peers: Vec<AgentId>,
        /// Normalized conflict score for the episode.
        conflict: f64,
    },
    /// A credit-seeking event.
    CreditSeek,
    /// A comprehension event.
    Comprehension {
        /// Whether the agent demonstrated context awareness.
        context_aware: bool,
        /// Normalized comprehension depth score.
        depth: f64,
    },
}

impl BehaviorSignal {
    /// Creates a collaboration signal with a clamped conflict score.
    #[must_use]
    pub fn collaboration(peers: Vec<AgentId>, conflict: f64) -> Self {
        Self::Collaboration {
            peers,
            conflict: clamp_unit(conflict),
        }
    }

    /// Creates a comprehension signal with a clamped depth score.
    #[must_use]
    pub fn comprehension(context_aware: bool, depth: f64) -> Self {
        Self::Comprehension {
            context_aware,
            depth: clamp_unit(depth),
        }
    }
}

/// Timestamped behavioral signal as stored in the per-agent log.
///
/// # Invariants
/// - Records are append-only; retention pruning removes whole records only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Observation timestamp.
    pub timestamp: Timestamp,
    /// Observed signal.
    pub signal: BehaviorSignal,
}
