// crates/conduct-gate-core/tests/manifold_unit.rs
// ============================================================================
// Module: Manifold Tests
// Description: Validate dampening, coupling rules, and overlay composition.
// Purpose: Ensure manifold evaluation reproduces the published rule table.
// ============================================================================

//! Manifold rule and dampening behavior tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use conduct_gate_core::AgentId;
use conduct_gate_core::Constraint;
use conduct_gate_core::ConstraintId;
use conduct_gate_core::ConstraintOverlay;
use conduct_gate_core::Dimension;
use conduct_gate_core::Manifold;
use conduct_gate_core::ManifoldError;
use conduct_gate_core::OperationalDim;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::PhaseState;
use conduct_gate_core::Predicate;
use conduct_gate_core::Severity;
use conduct_gate_core::Timestamp;
use conduct_gate_core::VirtueDim;
use conduct_gate_core::VirtueValues;
use smallvec::smallvec;

fn state_with(virtues: VirtueValues, operational: OperationalValues) -> PhaseState {
    PhaseState::new(
        AgentId::new("agent-m"),
        Timestamp::from_unix_millis(0),
        operational,
        virtues,
    )
}

#[allow(dead_code, reason = "Reserved helper for future virtue-based test cases.")]
fn virtues(truthfulness: f64) -> VirtueValues {
    VirtueValues {
        truthfulness,
        ..VirtueValues::uniform(0.5)
    }
}

#[test]
fn high_truthfulness_state_is_valid() {
    let manifold = Manifold::base();
    let state = state_with(VirtueValues::uniform(0.9), OperationalValues::uniform(0.5));
    assert!(manifold.is_valid(&state));
}

#[test]
fn dampening_is_identity_when_truthfulness_is_adequate() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.5,
            justice: 0.95,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    assert_eq!(manifold.dampen(&state), state);
}

#[test]
fn dampening_suppresses_elevated_virtues() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.4,
            justice: 0.9,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let dampened = manifold.dampen(&state);
    // 0.9 * 0.7 = 0.63, above the 0.5 floor.
    assert!((dampened.virtue(VirtueDim::Justice) - 0.63).abs() < 1e-12);
    assert_eq!(dampened.virtue(VirtueDim::Truthfulness), 0.4);
}

#[test]
fn dampening_respects_truthfulness_floor() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.45,
            trustworthiness: 0.71,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let dampened = manifold.dampen(&state);
    // 0.71 * 0.7 = 0.497 sits below truthfulness + 0.1.
    assert!((dampened.virtue(VirtueDim::Trustworthiness) - 0.55).abs() < 1e-12);
}

#[test]
fn dampening_is_idempotent() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.1,
            justice: 1.0,
            unity: 0.85,
            service: 0.72,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let once = manifold.dampen(&state);
    let twice = manifold.dampen(&once);
    assert_eq!(once, twice);
}

#[test]
fn dampening_never_raises_a_virtue() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.45,
            justice: 0.52,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let dampened = manifold.dampen(&state);
    for dim in VirtueDim::ALL {
        assert!(dampened.virtue(dim) <= state.virtue(dim));
    }
}

#[test]
fn elevated_virtue_requires_truthfulness_floor() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.55,
            detachment: 0.65,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let report = manifold.evaluate(&state);
    assert!(!report.is_valid());
    assert!(
        report
            .violations
            .iter()
            .any(|violation| violation.constraint_id.as_str() == "virtue-truthfulness-floor")
    );
}

#[test]
fn strong_virtue_requires_higher_truthfulness_floor() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.65,
            justice: 0.85,
            understanding: 0.65,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let report = manifold.evaluate(&state);
    assert!(
        report.violations.iter().any(
            |violation| violation.constraint_id.as_str() == "strong-virtue-truthfulness-floor"
        )
    );
}

#[test]
fn justice_demands_understanding() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.8,
            justice: 0.75,
            understanding: 0.5,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let report = manifold.evaluate(&state);
    assert!(
        report
            .violations
            .iter()
            .any(|violation| violation.constraint_id.as_str() == "justice-understanding-floor")
    );
}

#[test]
fn trustworthiness_demands_service() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.7,
            trustworthiness: 0.65,
            service: 0.4,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let report = manifold.evaluate(&state);
    assert!(
        report
            .violations
            .iter()
            .any(|violation| violation.constraint_id.as_str() == "trustworthiness-service-floor")
    );
}

#[test]
fn unity_demands_detachment_and_understanding() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.8,
            unity: 0.75,
            detachment: 0.5,
            understanding: 0.5,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let report = manifold.evaluate(&state);
    let ids: Vec<&str> =
        report.violations.iter().map(|violation| violation.constraint_id.as_str()).collect();
    assert!(ids.contains(&"unity-detachment-floor"));
    assert!(ids.contains(&"unity-understanding-floor"));
}

#[test]
fn low_justice_high_activity_is_forbidden() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            justice: 0.3,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues {
            activity: 0.9,
            ..OperationalValues::uniform(0.5)
        },
    );
    let report = manifold.evaluate(&state);
    let violation = report
        .violations
        .iter()
        .find(|violation| violation.constraint_id.as_str() == "justice-activity-coupling")
        .unwrap();
    assert_eq!(violation.severity, Severity::Critical);
}

#[test]
fn low_health_high_activity_is_forbidden() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues::uniform(0.5),
        OperationalValues {
            activity: 0.85,
            health: 0.2,
            ..OperationalValues::uniform(0.5)
        },
    );
    let report = manifold.evaluate(&state);
    assert!(
        report
            .violations
            .iter()
            .any(|violation| violation.constraint_id.as_str() == "health-activity-coupling")
    );
}

#[test]
fn boundary_values_do_not_trigger_couplings() {
    let manifold = Manifold::base();
    // Exactly at the thresholds: 0.5 justice is not "below 0.5" and 0.7
    // activity is not "above 0.7".
    let state = state_with(
        VirtueValues {
            justice: 0.5,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues {
            activity: 0.7,
            ..OperationalValues::uniform(0.5)
        },
    );
    assert!(manifold.is_valid(&state));
}

#[test]
fn overlay_adds_constraints_by_union() {
    let overlay = ConstraintOverlay {
        name: "research".to_string(),
        constraints: vec![Constraint {
            id: ConstraintId::new("research-understanding-floor"),
            severity: Severity::Standard,
            antecedent: Predicate::Above {
                dimension: Dimension::Operational(OperationalDim::Coordination),
                threshold: 0.6,
            },
            consequent: Predicate::AtLeast {
                dimension: Dimension::Virtue(VirtueDim::Understanding),
                threshold: 0.6,
            },
            repairs: smallvec![],
        }],
    };
    let manifold = Manifold::with_overlays(vec![overlay]).unwrap();
    assert_eq!(manifold.constraints().len(), Manifold::base().constraints().len() + 1);
    assert_eq!(manifold.overlay_names(), ["research".to_string()]);

    let state = state_with(
        VirtueValues {
            understanding: 0.4,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues {
            coordination: 0.65,
            ..OperationalValues::uniform(0.5)
        },
    );
    assert!(!manifold.is_valid(&state));
    // The base manifold alone accepts the same state.
    assert!(Manifold::base().is_valid(&state));
}

#[test]
fn overlay_shadowing_base_constraint_is_rejected() {
    let overlay = ConstraintOverlay {
        name: "weakening".to_string(),
        constraints: vec![Constraint {
            id: ConstraintId::new("virtue-truthfulness-floor"),
            severity: Severity::Notice,
            antecedent: Predicate::Never,
            consequent: Predicate::Never,
            repairs: smallvec![],
        }],
    };
    let error = Manifold::with_overlays(vec![overlay]).unwrap_err();
    assert!(matches!(error, ManifoldError::OverlayShadowsBase { .. }));
}

#[test]
fn overlay_without_repair_path_is_rejected() {
    let overlay = ConstraintOverlay {
        name: "opaque".to_string(),
        constraints: vec![Constraint {
            id: ConstraintId::new("opaque-rule"),
            severity: Severity::Standard,
            antecedent: Predicate::AnyVirtueAbove {
                threshold: 0.5,
            },
            consequent: Predicate::Never,
            repairs: smallvec![],
        }],
    };
    let error = Manifold::with_overlays(vec![overlay]).unwrap_err();
    assert!(matches!(error, ManifoldError::MissingRepair { .. }));
}

#[test]
fn dampening_rewrite_is_reported_as_violation() {
    let manifold = Manifold::base();
    let state = state_with(
        VirtueValues {
            truthfulness: 0.4,
            trustworthiness: 0.8,
            service: 0.4,
            ..VirtueValues::uniform(0.5)
        },
        OperationalValues::uniform(0.5),
    );
    let report = manifold.evaluate(&state);
    assert!(!report.is_valid());
    let rewrite = report
        .violations
        .iter()
        .find(|violation| violation.constraint_id.as_str() == "truthfulness-dampening")
        .unwrap();
    assert_eq!(rewrite.dimension, Dimension::Virtue(VirtueDim::Trustworthiness));
    assert!((rewrite.required - 0.56).abs() < 1e-12);
    // 0.56 sits below every coupling antecedent, so the rewrite is the only
    // violation.
    assert_eq!(report.violations.len(), 1);
}
