// crates/conduct-gate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Trajectory Store Tests
// Description: Validate durability, ordering, integrity, GC, and versioning.
// Purpose: Ensure the durable store honors the trajectory store contract.
// ============================================================================

//! SQLite trajectory store behavior tests.

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

use conduct_gate_core::ActionRef;
use conduct_gate_core::AgentId;
use conduct_gate_core::AttractorSnapshot;
use conduct_gate_core::GateOutcome;
use conduct_gate_core::GateReason;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::PhaseState;
use conduct_gate_core::SecurityEvent;
use conduct_gate_core::SecurityEventFilter;
use conduct_gate_core::Timestamp;
use conduct_gate_core::TrajectoryEntry;
use conduct_gate_core::TrajectoryStore;
use conduct_gate_core::TrajectoryStoreError;
use conduct_gate_core::TransitionKind;
use conduct_gate_core::ViolationList;
use conduct_gate_core::VirtueValues;
use conduct_gate_store_sqlite::SqliteStoreConfig;
use conduct_gate_store_sqlite::SqliteTrajectoryStore;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> SqliteTrajectoryStore {
    let path = dir.path().join("trajectories.db");
    SqliteTrajectoryStore::open(SqliteStoreConfig::new(path)).unwrap()
}

fn entry(agent: &AgentId, millis: i64) -> TrajectoryEntry {
    TrajectoryEntry {
        agent_id: agent.clone(),
        timestamp: Timestamp::from_unix_millis(millis),
        state: PhaseState::new(
            agent.clone(),
            Timestamp::from_unix_millis(millis),
            OperationalValues::uniform(0.5),
            VirtueValues::uniform(0.7),
        ),
        transition: TransitionKind::Steady,
        action_ref: ActionRef::new(format!("action-{millis}")),
        outcome: GateOutcome::Allowed,
        violations: Vec::new(),
    }
}

fn event(agent: &AgentId, millis: i64, allowed: bool) -> SecurityEvent {
    SecurityEvent {
        agent_id: agent.clone(),
        timestamp: Timestamp::from_unix_millis(millis),
        original_state: None,
        projected_state: None,
        violations: ViolationList::new(),
        residual_violations: ViolationList::new(),
        allowed,
        reason: if allowed { GateReason::Corrected } else { GateReason::ConstraintViolation },
        timed_out: false,
        fatal: false,
        low_confidence: false,
        detail: None,
        correlation_id: None,
    }
}

#[test]
fn entries_round_trip_through_the_database() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent = AgentId::new("agent-db");
    let original = entry(&agent, 1_000);
    store.append_entry(&original).unwrap();

    let window = store
        .window(&agent, Timestamp::from_unix_millis(0), Timestamp::from_unix_millis(2_000))
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].state, original.state);
    assert_eq!(window[0].outcome, GateOutcome::Allowed);
}

#[test]
fn entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let agent = AgentId::new("agent-db");
    {
        let store = open_store(&dir);
        store.append_entry(&entry(&agent, 1_000)).unwrap();
        store.append_entry(&entry(&agent, 2_000)).unwrap();
    }
    let store = open_store(&dir);
    let window = store
        .window(&agent, Timestamp::from_unix_millis(0), Timestamp::from_unix_millis(i64::MAX))
        .unwrap();
    assert_eq!(window.len(), 2);
}

#[test]
fn out_of_order_appends_are_rejected_across_reopen() {
    let dir = TempDir::new().unwrap();
    let agent = AgentId::new("agent-db");
    {
        let store = open_store(&dir);
        store.append_entry(&entry(&agent, 5_000)).unwrap();
    }
    let store = open_store(&dir);
    // Equal timestamps are accepted; regressions are not.
    store.append_entry(&entry(&agent, 5_000)).unwrap();
    let error = store.append_entry(&entry(&agent, 4_000)).unwrap_err();
    assert!(matches!(error, TrajectoryStoreError::OutOfOrder { .. }));
}

#[test]
fn security_events_get_monotonic_ids_and_filter() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent_a = AgentId::new("agent-a");
    let agent_b = AgentId::new("agent-b");

    let first = store.append_security_event(&event(&agent_a, 1_000, true)).unwrap();
    let second = store.append_security_event(&event(&agent_a, 2_000, false)).unwrap();
    let third = store.append_security_event(&event(&agent_b, 3_000, false)).unwrap();
    assert!(first < second);
    assert!(second < third);

    let blocked_for_a = store
        .security_events(&SecurityEventFilter {
            agent_id: Some(agent_a),
            blocked_only: true,
            ..SecurityEventFilter::default()
        })
        .unwrap();
    assert_eq!(blocked_for_a.len(), 1);
    assert_eq!(blocked_for_a[0].event_id, second);
}

#[test]
fn security_events_are_byte_stable_across_reads() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent = AgentId::new("agent-db");
    store.append_security_event(&event(&agent, 1_000, false)).unwrap();

    let first = store.security_events(&SecurityEventFilter::default()).unwrap();
    let second = store.security_events(&SecurityEventFilter::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].digest, second[0].digest);
}

#[test]
fn all_trajectories_builds_per_agent_windows() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for agent in ["agent-a", "agent-b"] {
        let agent_id = AgentId::new(agent);
        for millis in [1_000, 2_000, 3_000] {
            store.append_entry(&entry(&agent_id, millis)).unwrap();
        }
    }
    let windows = store.all_trajectories(2).unwrap();
    assert_eq!(windows.len(), 4);
    assert!(windows.iter().all(|window| window.states.len() == 2));
}

#[test]
fn snapshots_round_trip_with_monotonic_generations() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert!(store.latest_snapshot().unwrap().is_none());

    store
        .publish_snapshot(&AttractorSnapshot::empty(1, Timestamp::from_unix_millis(1)))
        .unwrap();
    store
        .publish_snapshot(&AttractorSnapshot::empty(3, Timestamp::from_unix_millis(2)))
        .unwrap();
    let error = store
        .publish_snapshot(&AttractorSnapshot::empty(2, Timestamp::from_unix_millis(3)))
        .unwrap_err();
    assert!(matches!(error, TrajectoryStoreError::Invalid(_)));

    let latest = store.latest_snapshot().unwrap().unwrap();
    assert_eq!(latest.generation, 3);
}

#[test]
fn future_snapshot_versions_are_rejected_on_read() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut snapshot = AttractorSnapshot::empty(1, Timestamp::from_unix_millis(1));
    snapshot.format_version = u32::MAX;
    store.publish_snapshot(&snapshot).unwrap();
    let error = store.latest_snapshot().unwrap_err();
    assert!(matches!(error, TrajectoryStoreError::VersionMismatch(_)));
}

#[test]
fn gc_deletes_strictly_below_the_horizon() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent = AgentId::new("agent-db");
    for millis in [1_000, 2_000, 3_000] {
        store.append_entry(&entry(&agent, millis)).unwrap();
    }
    store.append_security_event(&event(&agent, 1_500, false)).unwrap();

    let deleted = store.gc(Timestamp::from_unix_millis(2_000)).unwrap();
    assert_eq!(deleted, 2);
    let remaining = store
        .window(&agent, Timestamp::from_unix_millis(0), Timestamp::from_unix_millis(i64::MAX))
        .unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(store.stats().gc_deleted, 2);
}

#[test]
fn export_emits_one_json_line_per_record() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent = AgentId::new("agent-db");
    store.append_entry(&entry(&agent, 1_000)).unwrap();
    store.append_security_event(&event(&agent, 1_000, true)).unwrap();

    let lines = store.export_jsonl().unwrap();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("record").is_some());
    }
}

#[test]
fn stats_count_appends() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let agent = AgentId::new("agent-db");
    store.append_entry(&entry(&agent, 1_000)).unwrap();
    store.append_security_event(&event(&agent, 1_000, true)).unwrap();

    let stats = store.stats();
    assert_eq!(stats.entries_appended, 1);
    assert_eq!(stats.events_appended, 1);
    assert_eq!(stats.writes_rejected, 0);
}

#[test]
fn readiness_probes_the_database() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.readiness().unwrap();
}
