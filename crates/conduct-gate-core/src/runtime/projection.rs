// crates/conduct-gate-core/src/runtime/projection.rs
// ============================================================================
// Module: Conduct Gate Projection
// Description: Bounded nearest-valid repair with cooperative deadlines.
// Purpose: Move invalid states toward the valid region or give up explicitly.
// Dependencies: crate::core, crate::runtime::manifold
// ============================================================================

//! ## Overview
//! Projection repairs an invalid state by iterating: apply dampening, collect
//! failing constraints, apply their repair hints in deterministic order, and
//! re-check. Iterations are bounded and the deadline is polled at every
//! iteration, so a wall-clock budget can cancel projection cooperatively.
//! There is no silent non-convergence: the result is always one of
//! unchanged, repaired, failed, or timed out.
//!
//! Repair ordering: hints sort by (severity descending, dimension name
//! ascending); within one iteration the first repair to touch a dimension
//! wins and later hints for the same dimension are skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;
use std::time::Instant;

use crate::core::PhaseState;
use crate::core::RepairDirection;
use crate::core::RepairHint;
use crate::core::Severity;
use crate::core::ViolationList;
use crate::runtime::manifold::Manifold;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default maximum projection iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 16;

/// Default minimum per-dimension repair step.
pub const DEFAULT_MIN_STEP: f64 = 0.05;

/// Projection tuning parameters.
///
/// # Invariants
/// - `max_iterations` is at least 1.
/// - `min_step <= step_cap`; both are positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionConfig {
    /// Maximum repair iterations before projection gives up.
    pub max_iterations: usize,
    /// Minimum per-dimension step applied per iteration.
    pub min_step: f64,
    /// Maximum per-dimension step applied per iteration.
    pub step_cap: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_step: DEFAULT_MIN_STEP,
            step_cap: 1.0,
        }
    }
}

// ============================================================================
// SECTION: Deadline
// ============================================================================

/// Cooperative wall-clock deadline polled by projection.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// Absolute expiry instant; `None` never expires.
    expires_at: Option<Instant>,
}

impl Deadline {
    /// Returns a deadline that never expires.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            expires_at: None,
        }
    }

    /// Returns a deadline expiring after the given duration from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
        }
    }

    /// Returns whether the deadline has expired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

// ============================================================================
// SECTION: Projection Result
// ============================================================================

/// Outcome of a projection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// The state was already valid; no repair was applied.
    Unchanged(PhaseState),
    /// Repair produced a state satisfying the manifold.
    Repaired {
        /// Repaired state.
        state: PhaseState,
        /// Iterations consumed.
        iterations: usize,
    },
    /// The iteration budget was exhausted with violations remaining.
    Failed {
        /// Best state reached before giving up.
        state: PhaseState,
        /// Violations remaining on that state.
        residuals: ViolationList,
    },
    /// The wall-clock deadline expired during repair.
    TimedOut {
        /// Iterations completed before expiry.
        iterations: usize,
    },
}

// ============================================================================
// SECTION: Projection Algorithm
// ============================================================================

/// Projects a state toward the valid region of the manifold.
#[must_use]
pub fn project(
    manifold: &Manifold,
    state: &PhaseState,
    config: &ProjectionConfig,
    deadline: &Deadline,
) -> Projection {
    let report = manifold.evaluate(state);
    if report.is_valid() {
        return Projection::Unchanged(state.clone());
    }

    let mut current = report.dampened;
    for iteration in 0 .. config.max_iterations.max(1) {
        if deadline.expired() {
            return Projection::TimedOut {
                iterations: iteration,
            };
        }
        current = manifold.dampen(&current);
        let violated: Vec<(Severity, &RepairHint)> = manifold
            .constraints()
            .iter()
            .filter(|constraint| constraint.violated_by(&current))
            .flat_map(|constraint| {
                constraint.repairs.iter().map(move |hint| (constraint.severity, hint))
            })
            .collect();
        if violated.is_empty() {
            return Projection::Repaired {
                state: current,
                iterations: iteration,
            };
        }
        current = apply_repairs(&current, violated, config);
    }

    let residuals = manifold.evaluate(&current).violations;
    if residuals.is_empty() {
        Projection::Repaired {
            state: current,
            iterations: config.max_iterations,
        }
    } else {
        Projection::Failed {
            state: current,
            residuals,
        }
    }
}

/// Applies one iteration of ordered, first-writer-wins repairs.
fn apply_repairs(
    state: &PhaseState,
    mut repairs: Vec<(Severity, &RepairHint)>,
    config: &ProjectionConfig,
) -> PhaseState {
    repairs.sort_by(|(left_severity, left_hint), (right_severity, right_hint)| {
        right_severity
            .cmp(left_severity)
            .then_with(|| left_hint.dimension.name().cmp(right_hint.dimension.name()))
    });

    let mut current = state.clone();
    let mut touched: BTreeSet<usize> = BTreeSet::new();
    for (_, hint) in repairs {
        let index = hint.dimension.index();
        if touched.contains(&index) {
            continue;
        }
        let actual = current.value(hint.dimension);
        let satisfied = match hint.direction {
            RepairDirection::Raise => actual >= hint.target,
            RepairDirection::Lower => actual <= hint.target,
        };
        if satisfied {
            continue;
        }
        let gap = (hint.target - actual).abs();
        let step = gap.max(config.min_step).min(config.step_cap.max(config.min_step));
        let next_value = match hint.direction {
            RepairDirection::Raise => actual + step,
            RepairDirection::Lower => actual - step,
        };
        current = current.with_value(hint.dimension, next_value);
        touched.insert(index);
    }
    current
}
