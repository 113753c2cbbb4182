// crates/conduct-gate-core/src/runtime/manifold.rs
// ============================================================================
// Module: Conduct Gate Manifold
// Description: Base constraint set, truthfulness dampening, overlay composition.
// Purpose: Decide state validity deterministically and feed projection.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The manifold is the set of valid phase-space states. Evaluation first
//! applies the truthfulness dampening rewrite, then checks every constraint
//! against the dampened state; a state that dampening rewrites is itself
//! invalid and the rewrite appears in the violation report. Overlays add
//! constraints by set union and can never remove or weaken the base set.
//!
//! Evaluation is a pure function of the input state and the assembled
//! constraint list; the manifold itself is immutable once built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use smallvec::smallvec;
use thiserror::Error;

use crate::core::Constraint;
use crate::core::ConstraintId;
use crate::core::Dimension;
use crate::core::OperationalDim;
use crate::core::PhaseState;
use crate::core::Predicate;
use crate::core::RepairDirection;
use crate::core::RepairHint;
use crate::core::Severity;
use crate::core::ViolationList;
use crate::core::ViolationRecord;
use crate::core::VirtueDim;

// ============================================================================
// SECTION: Dampening Constants
// ============================================================================

/// Truthfulness value below which dampening activates.
pub const DAMPENING_TRIGGER: f64 = 0.5;

/// Virtues at or below this value are stable under the dampening rewrite.
///
/// The rewrite multiplies by [`DAMPENING_FACTOR`], so any value at or below
/// this threshold maps into the untouched region and a second application is
/// the identity. This is what makes dampening a one-pass, idempotent rewrite.
pub const DAMPENING_STABILITY_THRESHOLD: f64 = 0.7;

/// Multiplicative suppression factor applied to elevated virtues.
pub const DAMPENING_FACTOR: f64 = 0.7;

/// Margin above truthfulness that dampened virtues never drop below.
pub const DAMPENING_FLOOR_MARGIN: f64 = 0.1;

/// Constraint identifier reported for dampening rewrites.
#[must_use]
pub fn dampening_constraint_id() -> ConstraintId {
    ConstraintId::new("truthfulness-dampening")
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Manifold assembly errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ManifoldError {
    /// An overlay reused a constraint identifier already present.
    #[error("overlay {overlay} shadows constraint {constraint_id}")]
    OverlayShadowsBase {
        /// Offending overlay name.
        overlay: String,
        /// Shadowed constraint identifier.
        constraint_id: ConstraintId,
    },
    /// A constraint has neither repair hints nor a derivable repair target.
    #[error("constraint {constraint_id} has no repair hint and no derivable target")]
    MissingRepair {
        /// Offending constraint identifier.
        constraint_id: ConstraintId,
    },
}

// ============================================================================
// SECTION: Overlays
// ============================================================================

/// Named additive constraint overlay.
///
/// # Invariants
/// - Overlays add constraints by union; identifiers must not collide with the
///   base set or other enabled overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintOverlay {
    /// Overlay name.
    pub name: String,
    /// Constraints contributed by the overlay.
    pub constraints: Vec<Constraint>,
}

// ============================================================================
// SECTION: Violation Report
// ============================================================================

/// Result of evaluating a state against the manifold.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationReport {
    /// State after the dampening rewrite.
    pub dampened: PhaseState,
    /// Observed violations, including dampening rewrites.
    pub violations: ViolationList,
}

impl ViolationReport {
    /// Returns whether the evaluated state is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// SECTION: Manifold
// ============================================================================

/// Immutable set of valid states defined by the active constraints.
///
/// # Invariants
/// - Constraint identifiers are unique across base and overlays.
/// - Every constraint has at least one applicable repair hint.
#[derive(Debug, Clone)]
pub struct Manifold {
    /// Manifold name for diagnostics.
    name: String,
    /// Assembled constraints, base first.
    constraints: Vec<Constraint>,
    /// Number of base constraints at the front of `constraints`.
    base_count: usize,
    /// Names of enabled overlays.
    overlay_names: Vec<String>,
}

impl Manifold {
    /// Assembles the base manifold.
    #[must_use]
    pub fn base() -> Self {
        let constraints = base_constraint_set();
        let base_count = constraints.len();
        Self {
            name: "base".to_string(),
            constraints,
            base_count,
            overlay_names: Vec::new(),
        }
    }

    /// Assembles the base manifold with additional overlays.
    ///
    /// # Errors
    ///
    /// Returns [`ManifoldError::OverlayShadowsBase`] when an overlay reuses an
    /// existing constraint identifier, and [`ManifoldError::MissingRepair`]
    /// when an overlay constraint offers no way to repair a violation.
    pub fn with_overlays(overlays: Vec<ConstraintOverlay>) -> Result<Self, ManifoldError> {
        let mut manifold = Self::base();
        for overlay in overlays {
            for constraint in overlay.constraints {
                if manifold.constraints.iter().any(|existing| existing.id == constraint.id) {
                    return Err(ManifoldError::OverlayShadowsBase {
                        overlay: overlay.name,
                        constraint_id: constraint.id,
                    });
                }
                if repair_target(&constraint).is_none() {
                    return Err(ManifoldError::MissingRepair {
                        constraint_id: constraint.id,
                    });
                }
                manifold.constraints.push(constraint);
            }
            manifold.overlay_names.push(overlay.name);
        }
        if !manifold.overlay_names.is_empty() {
            manifold.name = format!("base+{}", manifold.overlay_names.join("+"));
        }
        Ok(manifold)
    }

    /// Returns the manifold name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the assembled constraints, base first.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns the base constraints only.
    #[must_use]
    pub fn base_constraints(&self) -> &[Constraint] {
        &self.constraints[.. self.base_count]
    }

    /// Returns the names of enabled overlays.
    #[must_use]
    pub fn overlay_names(&self) -> &[String] {
        &self.overlay_names
    }

    /// Applies the truthfulness dampening rewrite.
    ///
    /// When truthfulness is below [`DAMPENING_TRIGGER`], every other virtue
    /// strictly above [`DAMPENING_STABILITY_THRESHOLD`] is replaced with
    /// `max(DAMPENING_FACTOR * v, truthfulness + DAMPENING_FLOOR_MARGIN)`.
    /// The rewrite is strictly decreasing on affected virtues and idempotent.
    #[must_use]
    pub fn dampen(&self, state: &PhaseState) -> PhaseState {
        let truthfulness = state.virtue(VirtueDim::Truthfulness);
        if truthfulness >= DAMPENING_TRIGGER {
            return state.clone();
        }
        let floor = truthfulness + DAMPENING_FLOOR_MARGIN;
        let mut dampened = state.clone();
        for dim in VirtueDim::ALL {
            if dim == VirtueDim::Truthfulness {
                continue;
            }
            let value = state.virtue(dim);
            if value > DAMPENING_STABILITY_THRESHOLD {
                let suppressed = (DAMPENING_FACTOR * value).max(floor);
                dampened = dampened.with_value(Dimension::Virtue(dim), suppressed);
            }
        }
        dampened
    }

    /// Evaluates a state and returns the dampened state with all violations.
    #[must_use]
    pub fn evaluate(&self, state: &PhaseState) -> ViolationReport {
        let dampened = self.dampen(state);
        let mut violations = ViolationList::new();
        for dim in VirtueDim::ALL {
            let original = state.virtue(dim);
            let rewritten = dampened.virtue(dim);
            if rewritten < original {
                violations.push(ViolationRecord {
                    constraint_id: dampening_constraint_id(),
                    severity: Severity::Elevated,
                    dimension: Dimension::Virtue(dim),
                    observed: original,
                    required: rewritten,
                });
            }
        }
        for constraint in &self.constraints {
            if constraint.violated_by(&dampened)
                && let Some((dimension, required)) = repair_target(constraint)
            {
                violations.push(ViolationRecord {
                    constraint_id: constraint.id.clone(),
                    severity: constraint.severity,
                    dimension,
                    observed: dampened.value(dimension),
                    required,
                });
            }
        }
        ViolationReport {
            dampened,
            violations,
        }
    }

    /// Returns whether the state satisfies the manifold.
    #[must_use]
    pub fn is_valid(&self, state: &PhaseState) -> bool {
        self.evaluate(state).is_valid()
    }

    /// Returns whether the state satisfies the base constraints only.
    ///
    /// Used for attractor centers, which must sit in the valid region of the
    /// base manifold regardless of enabled overlays.
    #[must_use]
    pub fn satisfies_base(&self, state: &PhaseState) -> bool {
        let dampened = self.dampen(state);
        dampened == *state
            && self.base_constraints().iter().all(|constraint| !constraint.violated_by(state))
    }
}

impl Default for Manifold {
    fn default() -> Self {
        Self::base()
    }
}

/// Returns the primary repair dimension and target for a constraint.
fn repair_target(constraint: &Constraint) -> Option<(Dimension, f64)> {
    if let Some(hint) = constraint.repairs.first() {
        return Some((hint.dimension, hint.target));
    }
    if let Predicate::AtLeast {
        dimension,
        threshold,
    } = constraint.consequent
    {
        return Some((dimension, threshold));
    }
    None
}

// ============================================================================
// SECTION: Base Constraint Set
// ============================================================================

/// Builds a virtue-coupling constraint with a single raise repair.
fn virtue_floor(
    id: &str,
    severity: Severity,
    antecedent: Predicate,
    dim: VirtueDim,
    floor: f64,
) -> Constraint {
    Constraint {
        id: ConstraintId::new(id),
        severity,
        antecedent,
        consequent: Predicate::AtLeast {
            dimension: Dimension::Virtue(dim),
            threshold: floor,
        },
        repairs: smallvec![RepairHint {
            dimension: Dimension::Virtue(dim),
            direction: RepairDirection::Raise,
            target: floor,
        }],
    }
}

/// Builds a forbidden virtue/operational combination with paired repairs.
fn forbidden_combination(
    id: &str,
    low: Dimension,
    low_threshold: f64,
    high: Dimension,
    high_threshold: f64,
) -> Constraint {
    Constraint {
        id: ConstraintId::new(id),
        severity: Severity::Critical,
        antecedent: Predicate::All {
            predicates: vec![
                Predicate::Below {
                    dimension: low,
                    threshold: low_threshold,
                },
                Predicate::Above {
                    dimension: high,
                    threshold: high_threshold,
                },
            ],
        },
        consequent: Predicate::Never,
        repairs: smallvec![
            RepairHint {
                dimension: low,
                direction: RepairDirection::Raise,
                target: low_threshold,
            },
            RepairHint {
                dimension: high,
                direction: RepairDirection::Lower,
                target: high_threshold,
            },
        ],
    }
}

/// Returns the base constraint set shared by every manifold instance.
fn base_constraint_set() -> Vec<Constraint> {
    vec![
        virtue_floor(
            "virtue-truthfulness-floor",
            Severity::Standard,
            Predicate::AnyVirtueAbove {
                threshold: 0.6,
            },
            VirtueDim::Truthfulness,
            0.6,
        ),
        virtue_floor(
            "strong-virtue-truthfulness-floor",
            Severity::Elevated,
            Predicate::AnyVirtueAbove {
                threshold: 0.8,
            },
            VirtueDim::Truthfulness,
            0.7,
        ),
        virtue_floor(
            "justice-truthfulness-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Justice),
                threshold: 0.7,
            },
            VirtueDim::Truthfulness,
            0.7,
        ),
        virtue_floor(
            "justice-understanding-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Justice),
                threshold: 0.7,
            },
            VirtueDim::Understanding,
            0.6,
        ),
        virtue_floor(
            "trustworthiness-truthfulness-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Trustworthiness),
                threshold: 0.6,
            },
            VirtueDim::Truthfulness,
            0.6,
        ),
        virtue_floor(
            "trustworthiness-service-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Trustworthiness),
                threshold: 0.6,
            },
            VirtueDim::Service,
            0.5,
        ),
        virtue_floor(
            "unity-detachment-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Unity),
                threshold: 0.7,
            },
            VirtueDim::Detachment,
            0.6,
        ),
        virtue_floor(
            "unity-understanding-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Unity),
                threshold: 0.7,
            },
            VirtueDim::Understanding,
            0.6,
        ),
        virtue_floor(
            "service-detachment-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Service),
                threshold: 0.7,
            },
            VirtueDim::Detachment,
            0.6,
        ),
        virtue_floor(
            "service-understanding-floor",
            Severity::Standard,
            Predicate::Above {
                dimension: Dimension::Virtue(VirtueDim::Service),
                threshold: 0.7,
            },
            VirtueDim::Understanding,
            0.5,
        ),
        forbidden_combination(
            "justice-activity-coupling",
            Dimension::Virtue(VirtueDim::Justice),
            0.5,
            Dimension::Operational(OperationalDim::Activity),
            0.7,
        ),
        forbidden_combination(
            "service-resource-coupling",
            Dimension::Virtue(VirtueDim::Service),
            0.4,
            Dimension::Operational(OperationalDim::Resource),
            0.7,
        ),
        forbidden_combination(
            "truthfulness-coordination-coupling",
            Dimension::Virtue(VirtueDim::Truthfulness),
            0.5,
            Dimension::Operational(OperationalDim::Coordination),
            0.7,
        ),
        forbidden_combination(
            "health-activity-coupling",
            Dimension::Operational(OperationalDim::Health),
            0.3,
            Dimension::Operational(OperationalDim::Activity),
            0.8,
        ),
    ]
}
