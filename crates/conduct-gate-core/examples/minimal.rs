// crates/conduct-gate-core/examples/minimal.rs
// ============================================================================
// Module: Conduct Gate Minimal Example
// Description: Minimal end-to-end admission flow using in-memory adapters.
// Purpose: Demonstrate gate outcomes for clean and correctable states.
// Dependencies: conduct-gate-core
// ============================================================================

//! ## Overview
//! Gates two candidate actions through the base manifold using the in-memory
//! trajectory store: one clean admission and one that dampening and
//! projection must correct. This example is backend-agnostic and suitable
//! for quick verification.

#![allow(clippy::print_stdout, reason = "Examples report their outcome on stdout.")]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use conduct_gate_core::ActionDescriptor;
use conduct_gate_core::ActionGate;
use conduct_gate_core::ActionGateConfig;
use conduct_gate_core::ActionRef;
use conduct_gate_core::AgentId;
use conduct_gate_core::ComposeError;
use conduct_gate_core::ComposedState;
use conduct_gate_core::GateRequest;
use conduct_gate_core::ImpactClass;
use conduct_gate_core::InMemoryTrajectoryStore;
use conduct_gate_core::Manifold;
use conduct_gate_core::NullAdvisor;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::PhaseState;
use conduct_gate_core::StateComposer;
use conduct_gate_core::Timestamp;
use conduct_gate_core::VirtueValues;

/// Composer returning preset states per agent.
struct ExampleComposer {
    /// Preset states keyed by agent.
    states: Mutex<BTreeMap<AgentId, PhaseState>>,
}

impl StateComposer for ExampleComposer {
    fn compose(&self, agent_id: &AgentId, now: Timestamp) -> Result<ComposedState, ComposeError> {
        let state = self
            .states
            .lock()
            .map_err(|_| ComposeError::Internal("example mutex poisoned".to_string()))?
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ComposeError::Internal("unknown agent".to_string()))?;
        Ok(ComposedState {
            state: state.with_timestamp(now),
            insufficient: false,
        })
    }
}

fn main() {
    let steady = AgentId::new("steady-agent");
    let drifting = AgentId::new("drifting-agent");
    let mut states = BTreeMap::new();
    states.insert(
        steady.clone(),
        PhaseState::new(
            steady.clone(),
            Timestamp::from_unix_millis(0),
            OperationalValues::uniform(0.5),
            VirtueValues::uniform(0.9),
        ),
    );
    states.insert(
        drifting.clone(),
        PhaseState::new(
            drifting.clone(),
            Timestamp::from_unix_millis(0),
            OperationalValues::uniform(0.5),
            VirtueValues {
                truthfulness: 0.4,
                justice: 0.9,
                ..VirtueValues::uniform(0.5)
            },
        ),
    );

    let gate = ActionGate::new(
        Arc::new(Manifold::base()),
        ExampleComposer {
            states: Mutex::new(states),
        },
        InMemoryTrajectoryStore::new(),
        NullAdvisor,
        ActionGateConfig::default(),
    );

    for (index, agent_id) in [steady, drifting].into_iter().enumerate() {
        let result = gate.gate(&GateRequest {
            agent_id: agent_id.clone(),
            action_ref: ActionRef::new(format!("action-{index}")),
            action: ActionDescriptor {
                kind: "tool_call".to_string(),
                target: None,
                impact: ImpactClass::Standard,
            },
            now: Timestamp::from_unix_millis(1_000 + i64::try_from(index).unwrap_or(0)),
            latency_budget_ms: None,
            correlation_id: None,
        });
        println!("{agent_id}: {}", result.reason.user_message());
    }
}
