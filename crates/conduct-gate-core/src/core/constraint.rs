// crates/conduct-gate-core/src/core/constraint.rs
// ============================================================================
// Module: Conduct Gate Constraint Records
// Description: Declarative constraint predicates with repair hints.
// Purpose: Provide the serializable constraint form evaluated by the manifold.
// Dependencies: crate::core::{identifiers, state}, serde, smallvec
// ============================================================================

//! ## Overview
//! Constraints are declarative records, never callables: an antecedent
//! predicate, a consequent predicate, a severity rank, and bounded repair
//! hints. A state violates a constraint when the antecedent holds and the
//! consequent does not. Editor and overlay surfaces compile down to these
//! records, which keeps manifold evaluation a pure function of data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use crate::core::identifiers::ConstraintId;
use crate::core::state::Dimension;
use crate::core::state::PhaseState;
use crate::core::state::VirtueDim;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Severity rank used to order conflicting repairs deterministically.
///
/// # Invariants
/// - Ordering is total: `Notice < Standard < Elevated < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; never blocks on its own.
    Notice,
    /// Standard virtue coupling.
    Standard,
    /// Elevated virtue coupling or dampening rewrite.
    Elevated,
    /// Forbidden virtue/operational combination.
    Critical,
}

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Declarative predicate over a phase-space state.
///
/// # Invariants
/// - Evaluation is pure and total over clamped states; no variant can panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Some virtue dimension is strictly above the threshold.
    AnyVirtueAbove {
        /// Exclusive lower bound.
        threshold: f64,
    },
    /// The dimension is strictly above the threshold.
    Above {
        /// Dimension under test.
        dimension: Dimension,
        /// Exclusive lower bound.
        threshold: f64,
    },
    /// The dimension is strictly below the threshold.
    Below {
        /// Dimension under test.
        dimension: Dimension,
        /// Exclusive upper bound.
        threshold: f64,
    },
    /// The dimension is at or above the threshold.
    AtLeast {
        /// Dimension under test.
        dimension: Dimension,
        /// Inclusive lower bound.
        threshold: f64,
    },
    /// Every sub-predicate holds.
    All {
        /// Conjoined sub-predicates.
        predicates: Vec<Predicate>,
    },
    /// Never holds; used as the consequent of forbidden combinations.
    Never,
}

impl Predicate {
    /// Evaluates the predicate against a state.
    #[must_use]
    pub fn eval(&self, state: &PhaseState) -> bool {
        match self {
            Self::AnyVirtueAbove {
                threshold,
            } => VirtueDim::ALL.iter().any(|dim| state.virtue(*dim) > *threshold),
            Self::Above {
                dimension,
                threshold,
            } => state.value(*dimension) > *threshold,
            Self::Below {
                dimension,
                threshold,
            } => state.value(*dimension) < *threshold,
            Self::AtLeast {
                dimension,
                threshold,
            } => state.value(*dimension) >= *threshold,
            Self::All {
                predicates,
            } => predicates.iter().all(|predicate| predicate.eval(state)),
            Self::Never => false,
        }
    }
}

// ============================================================================
// SECTION: Repair Hints
// ============================================================================

/// Direction a repair moves a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairDirection {
    /// Move the dimension up toward the target.
    Raise,
    /// Move the dimension down toward the target.
    Lower,
}

/// Bounded repair hint attached to a constraint.
///
/// # Invariants
/// - `target` is the value at which the constraint stops failing for this
///   dimension; projection steps toward it, never past it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepairHint {
    /// Dimension to adjust.
    pub dimension: Dimension,
    /// Adjustment direction.
    pub direction: RepairDirection,
    /// Repair target value.
    pub target: f64,
}

// ============================================================================
// SECTION: Constraints
// ============================================================================

/// Declarative manifold constraint.
///
/// # Invariants
/// - `id` is unique within an assembled manifold.
/// - A state violates the constraint iff `antecedent` holds and `consequent`
///   does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint identifier.
    pub id: ConstraintId,
    /// Severity rank for repair ordering.
    pub severity: Severity,
    /// Antecedent predicate.
    pub antecedent: Predicate,
    /// Consequent predicate required whenever the antecedent holds.
    pub consequent: Predicate,
    /// Repair hints applied when the constraint is violated.
    pub repairs: SmallVec<[RepairHint; 2]>,
}

impl Constraint {
    /// Returns whether the state violates this constraint.
    #[must_use]
    pub fn violated_by(&self, state: &PhaseState) -> bool {
        self.antecedent.eval(state) && !self.consequent.eval(state)
    }
}
