// system-tests/src/lib.rs
// ============================================================================
// Module: Conduct Gate System Test Support
// Description: Shared fixtures for end-to-end admission tests.
// Purpose: Provide canned composers and stores for scenario tests.
// Dependencies: conduct-gate-core
// ============================================================================

//! ## Overview
//! Shared fixtures for the system test suite: a composer returning canned
//! states per agent and a store that always reports a saturated write queue.
//! Scenario tests drive the real gate, manifold, dynamics, and stores with
//! these fixtures where exact state values are required.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use conduct_gate_core::AgentId;
use conduct_gate_core::AttractorSnapshot;
use conduct_gate_core::ComposeError;
use conduct_gate_core::ComposedState;
use conduct_gate_core::EventId;
use conduct_gate_core::PhaseState;
use conduct_gate_core::SecurityEvent;
use conduct_gate_core::SecurityEventFilter;
use conduct_gate_core::SecurityEventRecord;
use conduct_gate_core::StateComposer;
use conduct_gate_core::Timestamp;
use conduct_gate_core::TrajectoryEntry;
use conduct_gate_core::TrajectoryStore;
use conduct_gate_core::TrajectoryStoreError;
use conduct_gate_core::TrajectoryWindow;

// ============================================================================
// SECTION: Canned Composer
// ============================================================================

/// Composer returning preset states per agent.
#[derive(Default)]
pub struct CannedComposer {
    /// Preset states keyed by agent.
    states: Mutex<BTreeMap<AgentId, PhaseState>>,
}

impl CannedComposer {
    /// Creates an empty canned composer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state composed for an agent.
    pub fn set_state(&self, agent_id: &AgentId, state: PhaseState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent_id.clone(), state);
    }
}

impl StateComposer for CannedComposer {
    fn compose(&self, agent_id: &AgentId, now: Timestamp) -> Result<ComposedState, ComposeError> {
        let state = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ComposeError::Internal(format!("no canned state for {agent_id}")))?;
        Ok(ComposedState {
            state: state.with_timestamp(now),
            insufficient: false,
        })
    }
}

// ============================================================================
// SECTION: Saturated Store
// ============================================================================

/// Store whose write queue is permanently full.
#[derive(Default)]
pub struct SaturatedStore;

impl TrajectoryStore for SaturatedStore {
    fn append_entry(&self, _entry: &TrajectoryEntry) -> Result<(), TrajectoryStoreError> {
        Err(TrajectoryStoreError::Overloaded {
            message: "writer queue full".to_string(),
            retry_after_ms: Some(2),
        })
    }

    fn append_security_event(
        &self,
        _event: &SecurityEvent,
    ) -> Result<EventId, TrajectoryStoreError> {
        Err(TrajectoryStoreError::Overloaded {
            message: "writer queue full".to_string(),
            retry_after_ms: Some(2),
        })
    }

    fn window(
        &self,
        _agent_id: &AgentId,
        _since: Timestamp,
        _until: Timestamp,
    ) -> Result<Vec<TrajectoryEntry>, TrajectoryStoreError> {
        Ok(Vec::new())
    }

    fn all_trajectories(
        &self,
        _window_size: usize,
    ) -> Result<Vec<TrajectoryWindow>, TrajectoryStoreError> {
        Ok(Vec::new())
    }

    fn security_events(
        &self,
        _filter: &SecurityEventFilter,
    ) -> Result<Vec<SecurityEventRecord>, TrajectoryStoreError> {
        Ok(Vec::new())
    }

    fn publish_snapshot(
        &self,
        _snapshot: &AttractorSnapshot,
    ) -> Result<(), TrajectoryStoreError> {
        Ok(())
    }

    fn latest_snapshot(&self) -> Result<Option<AttractorSnapshot>, TrajectoryStoreError> {
        Ok(None)
    }

    fn gc(&self, _horizon: Timestamp) -> Result<u64, TrajectoryStoreError> {
        Ok(0)
    }

    fn export_jsonl(&self) -> Result<Vec<String>, TrajectoryStoreError> {
        Ok(Vec::new())
    }
}
