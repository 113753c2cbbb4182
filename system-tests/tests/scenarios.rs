// system-tests/tests/scenarios.rs
// ============================================================================
// Module: Admission Scenario Tests
// Description: End-to-end gate scenarios with literal inputs and outcomes.
// Purpose: Exercise the whole admission path against the durable store.
// ============================================================================

//! End-to-end admission scenarios.

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

use std::sync::Arc;

use conduct_gate_core::ActionDescriptor;
use conduct_gate_core::ActionGate;
use conduct_gate_core::ActionGateConfig;
use conduct_gate_core::ActionRef;
use conduct_gate_core::AgentId;
use conduct_gate_core::GateOutcome;
use conduct_gate_core::GateReason;
use conduct_gate_core::GateRequest;
use conduct_gate_core::ImpactClass;
use conduct_gate_core::InterventionKind;
use conduct_gate_core::InterventionPolicy;
use conduct_gate_core::Manifold;
use conduct_gate_core::NullAdvisor;
use conduct_gate_core::OperationalDim;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::OutcomeFeedback;
use conduct_gate_core::PhaseState;
use conduct_gate_core::SecurityEventFilter;
use conduct_gate_core::Timestamp;
use conduct_gate_core::TrajectoryStore;
use conduct_gate_core::VirtueDim;
use conduct_gate_core::VirtueValues;
use conduct_gate_dynamics::AttractorEngine;
use conduct_gate_dynamics::ClusteringConfig;
use conduct_gate_dynamics::DynamicsConfig;
use conduct_gate_dynamics::InterventionManager;
use conduct_gate_store_sqlite::SqliteStoreConfig;
use conduct_gate_store_sqlite::SqliteTrajectoryStore;
use system_tests::CannedComposer;
use system_tests::SaturatedStore;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> SqliteTrajectoryStore {
    SqliteTrajectoryStore::open(SqliteStoreConfig::new(dir.path().join("engine.db"))).unwrap()
}

fn request(agent_id: &AgentId, millis: i64) -> GateRequest {
    GateRequest {
        agent_id: agent_id.clone(),
        action_ref: ActionRef::new(format!("action-{millis}")),
        action: ActionDescriptor {
            kind: "tool_call".to_string(),
            target: None,
            impact: ImpactClass::Standard,
        },
        now: Timestamp::from_unix_millis(millis),
        latency_budget_ms: None,
        correlation_id: None,
    }
}

fn state(agent_id: &AgentId, virtues: VirtueValues, operational: OperationalValues) -> PhaseState {
    PhaseState::new(agent_id.clone(), Timestamp::from_unix_millis(0), operational, virtues)
}

#[test]
fn high_virtue_state_is_admitted_without_audit() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent_id = AgentId::new("agent-s1");
    let composer = CannedComposer::new();
    composer.set_state(
        &agent_id,
        state(&agent_id, VirtueValues::uniform(0.9), OperationalValues::uniform(0.5)),
    );
    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        composer,
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );

    let result = gate.gate(&request(&agent_id, 1_000));
    assert_eq!(result.outcome, GateOutcome::Allowed);
    assert_eq!(result.reason, GateReason::Valid);
    assert!(result.security_event_id.is_none());
    assert!(store.security_events(&SecurityEventFilter::default()).unwrap().is_empty());
}

#[test]
fn low_truthfulness_high_justice_is_dampened_and_corrected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent_id = AgentId::new("agent-s2");
    let composer = CannedComposer::new();
    composer.set_state(
        &agent_id,
        state(
            &agent_id,
            VirtueValues {
                truthfulness: 0.4,
                justice: 0.9,
                ..VirtueValues::uniform(0.5)
            },
            OperationalValues::uniform(0.5),
        ),
    );
    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        composer,
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );

    let result = gate.gate(&request(&agent_id, 1_000));
    assert_eq!(result.outcome, GateOutcome::AllowedWithCorrection);

    // Dampening rewrites justice to max(0.9 * 0.7, 0.4 + 0.1) = 0.63; the
    // elevated-virtue rule fires against the dampened value while the
    // stronger 0.8-trigger rule stays quiet.
    let ids: Vec<&str> =
        result.violations.iter().map(|violation| violation.constraint_id.as_str()).collect();
    assert!(ids.contains(&"virtue-truthfulness-floor"));
    assert!(!ids.contains(&"strong-virtue-truthfulness-floor"));

    let projected = result.projected_state.unwrap();
    assert!((projected.virtue(VirtueDim::Justice) - 0.63).abs() < 1e-12);
    assert!((projected.virtue(VirtueDim::Truthfulness) - 0.6).abs() < 1e-12);
    assert!(result.residual_violations.is_empty());

    let events = store.security_events(&SecurityEventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].event.allowed);
}

#[test]
fn elevated_trustworthiness_with_low_truthfulness_is_suppressed() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent_id = AgentId::new("agent-s3");
    let composer = CannedComposer::new();
    composer.set_state(
        &agent_id,
        state(
            &agent_id,
            VirtueValues {
                truthfulness: 0.4,
                trustworthiness: 0.8,
                service: 0.4,
                ..VirtueValues::uniform(0.5)
            },
            OperationalValues::uniform(0.5),
        ),
    );
    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        composer,
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );

    let result = gate.gate(&request(&agent_id, 1_000));
    assert_eq!(result.outcome, GateOutcome::AllowedWithCorrection);

    // Trustworthiness is dampened below the 0.6 trigger, so no further
    // coupling rules fire against the suppressed value.
    let projected = result.projected_state.unwrap();
    assert!((projected.virtue(VirtueDim::Trustworthiness) - 0.56).abs() < 1e-12);
    assert!(result.residual_violations.is_empty());
    assert!(
        result
            .violations
            .iter()
            .any(|violation| violation.constraint_id.as_str() == "truthfulness-dampening")
    );
}

#[test]
fn low_justice_high_activity_is_repaired_to_the_boundary() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent_id = AgentId::new("agent-s4");
    let composer = CannedComposer::new();
    composer.set_state(
        &agent_id,
        state(
            &agent_id,
            VirtueValues {
                justice: 0.3,
                ..VirtueValues::uniform(0.5)
            },
            OperationalValues {
                activity: 0.9,
                ..OperationalValues::uniform(0.5)
            },
        ),
    );
    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        composer,
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );

    let result = gate.gate(&request(&agent_id, 1_000));
    assert_eq!(result.outcome, GateOutcome::AllowedWithCorrection);
    let projected = result.projected_state.unwrap();
    assert!((projected.virtue(VirtueDim::Justice) - 0.5).abs() < 1e-12);
    assert!((projected.operational(OperationalDim::Activity) - 0.7).abs() < 1e-12);
}

#[test]
fn exhausted_budget_blocks_the_same_state() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent_id = AgentId::new("agent-s4");
    let composer = CannedComposer::new();
    composer.set_state(
        &agent_id,
        state(
            &agent_id,
            VirtueValues {
                justice: 0.3,
                ..VirtueValues::uniform(0.5)
            },
            OperationalValues {
                activity: 0.9,
                ..OperationalValues::uniform(0.5)
            },
        ),
    );
    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        composer,
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );

    let mut timed_request = request(&agent_id, 1_000);
    timed_request.latency_budget_ms = Some(0);
    let result = gate.gate(&timed_request);
    assert_eq!(result.outcome, GateOutcome::Blocked);
    assert_eq!(result.reason, GateReason::Timeout);

    let events = store.security_events(&SecurityEventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].event.timed_out);
}

#[test]
fn detrimental_basin_tenure_attaches_a_restrict_intervention() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent_id = AgentId::new("agent-s5");
    let inhabited =
        state(&agent_id, VirtueValues::uniform(0.9), OperationalValues::uniform(0.5));

    // Seed a tight cluster the agent inhabits and classify it detrimental
    // through strongly negative user feedback.
    for millis in [1_000, 2_000, 3_000, 4_000] {
        let entry = conduct_gate_core::TrajectoryEntry {
            agent_id: agent_id.clone(),
            timestamp: Timestamp::from_unix_millis(millis),
            state: inhabited.clone(),
            transition: conduct_gate_core::TransitionKind::Steady,
            action_ref: ActionRef::new(format!("seed-{millis}")),
            outcome: GateOutcome::Allowed,
            violations: Vec::new(),
        };
        store.append_entry(&entry).unwrap();
    }
    let dynamics = DynamicsConfig {
        clustering: ClusteringConfig {
            epsilon: 0.3,
            min_samples: 2,
            window_size: 2,
        },
        ..DynamicsConfig::default()
    };
    let engine = Arc::new(AttractorEngine::new(dynamics, Arc::new(Manifold::base())));
    engine.record_outcome(OutcomeFeedback::new(
        ActionRef::new("seed-feedback"),
        agent_id.clone(),
        inhabited.clone(),
        0.9,
        0.2,
        -0.6,
        0,
        0.0,
        0.0,
        Timestamp::from_unix_millis(4_000),
    ));
    engine.recompute(&store, Timestamp::from_unix_millis(5_000)).unwrap();

    let policy = InterventionPolicy {
        supervise_tenure_ms: 1_000,
        restrict_tenure_ms: 2_000,
        block_tenure_ms: 60_000,
        throttle_rate_factor: 0.5,
        restricted_capabilities: vec!["external_io".to_string()],
    };
    let manager = Arc::new(InterventionManager::new(engine, policy));
    let composer = CannedComposer::new();
    composer.set_state(&agent_id, inhabited);
    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        composer,
        store,
        manager,
        ActionGateConfig::default(),
    );

    // First call establishes basin tenure; the outcome itself is unaffected.
    let first = gate.gate(&request(&agent_id, 10_000));
    assert_eq!(first.outcome, GateOutcome::Allowed);
    assert!(matches!(
        first.intervention.as_ref().unwrap().kind,
        InterventionKind::Throttle { .. }
    ));

    // Past the restrict threshold the advice escalates while admission is
    // still clean.
    let later = gate.gate(&request(&agent_id, 12_500));
    assert_eq!(later.outcome, GateOutcome::Allowed);
    let intervention = later.intervention.unwrap();
    assert!(matches!(intervention.kind, InterventionKind::Restrict { .. }));
    assert!(intervention.attractor_id.is_some());
}

#[test]
fn saturated_write_queue_blocks_and_spills_the_audit_event() {
    let agent_id = AgentId::new("agent-s6");
    let composer = CannedComposer::new();
    composer.set_state(
        &agent_id,
        state(&agent_id, VirtueValues::uniform(0.9), OperationalValues::uniform(0.5)),
    );
    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        composer,
        SaturatedStore,
        NullAdvisor,
        ActionGateConfig::default(),
    );

    let result = gate.gate(&request(&agent_id, 1_000));
    assert_eq!(result.outcome, GateOutcome::Blocked);
    assert_eq!(result.reason, GateReason::StorageUnavailable);
    // The security event lands on the secondary path; the miss counter only
    // records events the secondary path could not keep.
    assert_eq!(gate.spilled_events().len(), 1);
    assert_eq!(gate.audit_misses(), 0);
}
