// crates/conduct-gate-config/tests/boundary_validation.rs
// =============================================================================
// Module: Config Boundary Validation Tests
// Description: Validate cross-field invariants on configuration values.
// Purpose: Ensure every out-of-range setting is rejected with a clear error.
// =============================================================================

//! Config boundary validation tests for conduct-gate-config.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use conduct_gate_config::ConductGateConfig;
use conduct_gate_config::ConfigError;
use conduct_gate_core::Constraint;
use conduct_gate_core::ConstraintId;
use conduct_gate_core::ConstraintOverlay;
use conduct_gate_core::Predicate;
use conduct_gate_core::Severity;
use conduct_gate_core::TimeoutPolicy;
use smallvec::smallvec;

fn assert_invalid(config: &ConductGateConfig, needle: &str) {
    let error = config.validate().unwrap_err();
    let message = error.to_string();
    assert!(message.contains(needle), "error {message} did not contain {needle}");
}

#[test]
fn default_configuration_is_valid() {
    ConductGateConfig::default().validate().unwrap();
}

#[test]
fn retention_must_stay_within_the_seven_day_cap() {
    let mut config = ConductGateConfig::default();
    config.signals.retention_ms = 8 * 24 * 60 * 60 * 1_000;
    assert_invalid(&config, "signals.retention_ms");

    config.signals.retention_ms = 0;
    assert_invalid(&config, "signals.retention_ms");
}

#[test]
fn ema_alpha_must_be_a_valid_smoothing_factor() {
    let mut config = ConductGateConfig::default();
    config.signals.meter.ema_alpha = 0.0;
    assert_invalid(&config, "ema_alpha");

    config.signals.meter.ema_alpha = 1.5;
    assert_invalid(&config, "ema_alpha");
}

#[test]
fn projection_step_bounds_are_ordered() {
    let mut config = ConductGateConfig::default();
    config.manifold.projection_min_step = 0.2;
    config.manifold.projection_step_cap = 0.1;
    assert_invalid(&config, "projection_step_cap");

    config.manifold.projection_min_step = 0.0;
    assert_invalid(&config, "projection_min_step");
}

#[test]
fn timeout_pass_requires_explicit_acknowledgment() {
    let mut config = ConductGateConfig::default();
    config.gate.timeout_policy = TimeoutPolicy::AllowUncorrected;
    assert_invalid(&config, "unsafe_allow_timeout_pass");

    config.gate.unsafe_allow_timeout_pass = true;
    config.validate().unwrap();
}

#[test]
fn classifier_thresholds_are_ordered() {
    let mut config = ConductGateConfig::default();
    config.dynamics.engine.classifier.tau_low = 0.8;
    config.dynamics.engine.classifier.tau_eff = 0.7;
    assert_invalid(&config, "tau_low < tau_eff");
}

#[test]
fn intervention_tenures_are_strictly_increasing() {
    let mut config = ConductGateConfig::default();
    config.dynamics.intervention.supervise_tenure_ms = 2_000;
    config.dynamics.intervention.restrict_tenure_ms = 2_000;
    config.dynamics.intervention.block_tenure_ms = 3_000;
    assert_invalid(&config, "strictly increasing");
}

#[test]
fn clustering_window_needs_at_least_two_states() {
    let mut config = ConductGateConfig::default();
    config.dynamics.engine.clustering.window_size = 1;
    assert_invalid(&config, "window_size");
}

#[test]
fn calibration_window_must_cover_the_sample_floor() {
    let mut config = ConductGateConfig::default();
    config.calibration.sample_floor = 100;
    config.calibration.drift_window = 50;
    assert_invalid(&config, "drift_window");
}

#[test]
fn overlays_that_shadow_base_constraints_are_rejected() {
    let mut config = ConductGateConfig::default();
    config.manifold.overlays.push(ConstraintOverlay {
        name: "weakening".to_string(),
        constraints: vec![Constraint {
            id: ConstraintId::new("virtue-truthfulness-floor"),
            severity: Severity::Notice,
            antecedent: Predicate::Never,
            consequent: Predicate::Never,
            repairs: smallvec![],
        }],
    });
    let error = config.validate().unwrap_err();
    assert!(matches!(error, ConfigError::Manifold(_)));
}

#[test]
fn well_formed_overlays_are_accepted() {
    let mut config = ConductGateConfig::default();
    config.manifold.overlays.push(ConstraintOverlay {
        name: "research".to_string(),
        constraints: vec![Constraint {
            id: ConstraintId::new("research-extra-floor"),
            severity: Severity::Standard,
            antecedent: Predicate::AnyVirtueAbove {
                threshold: 0.9,
            },
            consequent: Predicate::AtLeast {
                dimension: conduct_gate_core::Dimension::Virtue(
                    conduct_gate_core::VirtueDim::Understanding,
                ),
                threshold: 0.5,
            },
            repairs: smallvec![],
        }],
    });
    config.validate().unwrap();
}
