// system-tests/tests/pipeline.rs
// ============================================================================
// Module: Full Pipeline Tests
// Description: Signals, gate, durable store, and dynamics wired together.
// Purpose: Exercise the real measurement path end-to-end.
// ============================================================================

//! Full-stack admission pipeline tests.

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

use conduct_gate_config::ConductGateConfig;
use conduct_gate_core::ActionDescriptor;
use conduct_gate_core::ActionEvent;
use conduct_gate_core::ActionGate;
use conduct_gate_core::ActionGateConfig;
use conduct_gate_core::ActionOutcome;
use conduct_gate_core::ActionRef;
use conduct_gate_core::AgentId;
use conduct_gate_core::GateOutcome;
use conduct_gate_core::GateRequest;
use conduct_gate_core::ImpactClass;
use conduct_gate_core::NullAdvisor;
use conduct_gate_core::SecurityEventFilter;
use conduct_gate_core::Timestamp;
use conduct_gate_core::TrajectoryStore;
use conduct_gate_signals::CompositeComposer;
use conduct_gate_signals::SignalsConfig;
use conduct_gate_store_sqlite::SqliteStoreConfig;
use conduct_gate_store_sqlite::SqliteTrajectoryStore;
use tempfile::TempDir;

/// Records evidence that composes into a state the base manifold accepts.
fn record_clean_evidence(composer: &CompositeComposer, agent_id: &AgentId) {
    composer.record_action(
        agent_id,
        Timestamp::from_unix_millis(500),
        ActionEvent::new("task", 0.4, 0.6).with_outcome(ActionOutcome::Success),
    );
    for index in 0 .. 10i64 {
        composer.record_claim(
            agent_id,
            Timestamp::from_unix_millis(510 + index),
            ActionRef::new(format!("claim-{index}")),
            true,
        );
    }
    composer.record_comprehension(agent_id, Timestamp::from_unix_millis(530), true, 0.7);
}

fn request(agent_id: &AgentId, millis: i64) -> GateRequest {
    GateRequest {
        agent_id: agent_id.clone(),
        action_ref: ActionRef::new(format!("action-{millis}")),
        action: ActionDescriptor {
            kind: "tool_call".to_string(),
            target: Some("workspace".to_string()),
            impact: ImpactClass::Standard,
        },
        now: Timestamp::from_unix_millis(millis),
        latency_budget_ms: None,
        correlation_id: None,
    }
}

#[test]
fn well_behaved_agents_pass_the_measured_pipeline() {
    let dir = TempDir::new().unwrap();
    let store =
        SqliteTrajectoryStore::open(SqliteStoreConfig::new(dir.path().join("engine.db"))).unwrap();
    let composer = Arc::new(CompositeComposer::new(SignalsConfig::default()));
    let agent_id = AgentId::new("worker-1");

    for index in 0 .. 15i64 {
        let millis = 1_000 + index * 100;
        composer.record_action(
            &agent_id,
            Timestamp::from_unix_millis(millis),
            ActionEvent::new("task", 0.4, 0.6)
                .with_outcome(ActionOutcome::Success)
                .with_cost(0.1),
        );
        composer.record_claim(
            &agent_id,
            Timestamp::from_unix_millis(millis + 10),
            ActionRef::new(format!("claim-{index}")),
            true,
        );
        composer.record_commitment(
            &agent_id,
            Timestamp::from_unix_millis(millis + 20),
            ActionRef::new(format!("commitment-{index}")),
            true,
        );
        composer.record_comprehension(
            &agent_id,
            Timestamp::from_unix_millis(millis + 30),
            true,
            0.7,
        );
    }

    let gate = ActionGate::new(
        Arc::new(conduct_gate_core::Manifold::base()),
        Arc::clone(&composer),
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );
    let result = gate.gate(&request(&agent_id, 10_000));
    assert_eq!(result.outcome, GateOutcome::Allowed);
    assert!(result.security_event_id.is_none());

    let entries = store
        .window(&agent_id, Timestamp::from_unix_millis(0), Timestamp::from_unix_millis(i64::MAX))
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn self_serving_expensive_behavior_is_corrected_and_audited() {
    let dir = TempDir::new().unwrap();
    let store =
        SqliteTrajectoryStore::open(SqliteStoreConfig::new(dir.path().join("engine.db"))).unwrap();
    let composer = Arc::new(CompositeComposer::new(SignalsConfig::default()));
    let agent_id = AgentId::new("worker-2");

    for index in 0 .. 20i64 {
        let millis = 1_000 + index * 100;
        composer.record_action(
            &agent_id,
            Timestamp::from_unix_millis(millis),
            ActionEvent::new("task", 0.9, 0.1)
                .with_outcome(ActionOutcome::Success)
                .with_cost(0.9),
        );
        composer.record_claim(
            &agent_id,
            Timestamp::from_unix_millis(millis + 10),
            ActionRef::new(format!("claim-{index}")),
            false,
        );
    }

    let gate = ActionGate::new(
        Arc::new(conduct_gate_core::Manifold::base()),
        Arc::clone(&composer),
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );
    let result = gate.gate(&request(&agent_id, 10_000));
    assert_eq!(result.outcome, GateOutcome::AllowedWithCorrection);
    assert!(result.security_event_id.is_some());

    let events = store
        .security_events(&SecurityEventFilter {
            agent_id: Some(agent_id),
            ..SecurityEventFilter::default()
        })
        .unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].event.allowed);
    assert!(!events[0].event.violations.is_empty());
}

#[test]
fn retention_gc_prunes_old_trajectory_entries() {
    let dir = TempDir::new().unwrap();
    let store =
        SqliteTrajectoryStore::open(SqliteStoreConfig::new(dir.path().join("engine.db"))).unwrap();
    let composer = Arc::new(CompositeComposer::new(SignalsConfig::default()));
    let agent_id = AgentId::new("worker-3");
    record_clean_evidence(&composer, &agent_id);

    let gate = ActionGate::new(
        Arc::new(conduct_gate_core::Manifold::base()),
        Arc::clone(&composer),
        store.clone(),
        NullAdvisor,
        ActionGateConfig::default(),
    );
    gate.gate(&request(&agent_id, 1_000));
    gate.gate(&request(&agent_id, 100_000));

    let deleted = store.gc(Timestamp::from_unix_millis(50_000)).unwrap();
    assert_eq!(deleted, 1);
    let remaining = store
        .window(&agent_id, Timestamp::from_unix_millis(0), Timestamp::from_unix_millis(i64::MAX))
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].timestamp, Timestamp::from_unix_millis(100_000));

    let export = store.export_jsonl().unwrap();
    assert_eq!(export.len(), 1);
}

#[test]
fn configuration_sections_assemble_the_whole_engine() {
    let dir = TempDir::new().unwrap();
    let mut config = ConductGateConfig::default();
    config.store.path = dir.path().join("engine.db");
    config.validate().unwrap();

    let manifold = Arc::new(config.manifold.assemble_manifold().unwrap());
    let store = SqliteTrajectoryStore::open(config.store.store()).unwrap();
    let composer = Arc::new(CompositeComposer::new(config.signals));
    let gate_config = ActionGateConfig {
        latency_budget_ms: config.gate.latency_budget_ms,
        timeout_policy: config.gate.timeout_policy,
        backpressure_policy: config.gate.backpressure_policy,
        projection: config.manifold.projection(),
    };
    let gate = ActionGate::new(manifold, composer.clone(), store, NullAdvisor, gate_config);

    let agent_id = AgentId::new("worker-4");
    record_clean_evidence(&composer, &agent_id);
    let result = gate.gate(&request(&agent_id, 1_000));
    assert_eq!(result.outcome, GateOutcome::Allowed);
}
