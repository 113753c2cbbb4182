// crates/conduct-gate-dynamics/tests/classify_unit.rs
// ============================================================================
// Module: Attractor Classification Tests
// Description: Validate the beneficial/neutral/detrimental decision table.
// Purpose: Ensure classification is deterministic and threshold-correct.
// ============================================================================

//! Attractor classification behavior tests.

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

use conduct_gate_core::ActionRef;
use conduct_gate_core::AgentId;
use conduct_gate_core::AttractorClassification;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::OutcomeFeedback;
use conduct_gate_core::PhaseState;
use conduct_gate_core::Timestamp;
use conduct_gate_core::VirtueValues;
use conduct_gate_dynamics::ClassifierConfig;
use conduct_gate_dynamics::aggregate;
use conduct_gate_dynamics::classify;

#[allow(clippy::too_many_arguments, reason = "Fixture mirrors the record fields.")]
fn feedback(
    effectiveness: f64,
    resource: f64,
    user_feedback: f64,
    security_events: u32,
    task_complexity: f64,
    urgency: f64,
) -> OutcomeFeedback {
    let agent = AgentId::new("agent-f");
    OutcomeFeedback::new(
        ActionRef::new("action-f"),
        agent.clone(),
        PhaseState::new(
            agent,
            Timestamp::from_unix_millis(0),
            OperationalValues::uniform(0.5),
            VirtueValues::uniform(0.7),
        ),
        effectiveness,
        resource,
        user_feedback,
        security_events,
        task_complexity,
        urgency,
        Timestamp::from_unix_millis(0),
    )
}

#[test]
fn effective_liked_incident_free_cheap_is_beneficial() {
    let config = ClassifierConfig::default();
    let records = vec![feedback(0.9, 0.2, 0.8, 0, 0.0, 0.0), feedback(0.8, 0.3, 0.6, 0, 0.0, 0.0)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    assert_eq!(classify(&config, &refs), AttractorClassification::Beneficial);
}

#[test]
fn any_security_event_is_detrimental() {
    let config = ClassifierConfig::default();
    let records = vec![feedback(0.9, 0.2, 0.8, 0, 0.0, 0.0), feedback(0.9, 0.2, 0.8, 1, 0.0, 0.0)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    assert_eq!(classify(&config, &refs), AttractorClassification::Detrimental);
}

#[test]
fn strong_negative_sentiment_is_detrimental() {
    let config = ClassifierConfig::default();
    let records = vec![feedback(0.6, 0.2, -0.6, 0, 0.0, 0.0)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    assert_eq!(classify(&config, &refs), AttractorClassification::Detrimental);
}

#[test]
fn low_effectiveness_is_detrimental() {
    let config = ClassifierConfig::default();
    let records = vec![feedback(0.2, 0.2, 0.5, 0, 0.0, 0.0)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    assert_eq!(classify(&config, &refs), AttractorClassification::Detrimental);
}

#[test]
fn expensive_but_effective_work_is_neutral() {
    let config = ClassifierConfig::default();
    // High raw cost with no complexity or urgency discount.
    let records = vec![feedback(0.9, 0.9, 0.8, 0, 0.0, 0.0)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    assert_eq!(classify(&config, &refs), AttractorClassification::Neutral);
}

#[test]
fn complexity_and_urgency_discount_cost_into_acceptance() {
    let config = ClassifierConfig::default();
    // 0.9 * (1 - 0.5*0.8 - 0.3*0.5) = 0.9 * 0.45 = 0.405 <= tau_cost.
    let records = vec![feedback(0.9, 0.9, 0.8, 0, 0.8, 0.5)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    assert_eq!(classify(&config, &refs), AttractorClassification::Beneficial);
}

#[test]
fn empty_feedback_is_neutral() {
    let config = ClassifierConfig::default();
    assert_eq!(classify(&config, &[]), AttractorClassification::Neutral);
}

#[test]
fn classification_is_deterministic_for_identical_input() {
    let config = ClassifierConfig::default();
    let records = vec![feedback(0.7, 0.4, 0.2, 0, 0.3, 0.1), feedback(0.6, 0.5, 0.1, 0, 0.2, 0.4)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    let first = classify(&config, &refs);
    let second = classify(&config, &refs);
    assert_eq!(first, second);
}

#[test]
fn aggregate_reports_means_and_sample_count() {
    let records = vec![feedback(0.4, 0.2, 0.0, 0, 0.0, 0.0), feedback(0.8, 0.6, 1.0, 2, 0.0, 0.0)];
    let refs: Vec<&OutcomeFeedback> = records.iter().collect();
    let means = aggregate(&refs);
    assert_eq!(means.samples, 2);
    assert!((means.effectiveness - 0.6).abs() < 1e-12);
    assert!((means.user_feedback - 0.5).abs() < 1e-12);
    assert!((means.security_events - 1.0).abs() < 1e-12);
    assert!((means.adjusted_cost - 0.4).abs() < 1e-12);
}
