// crates/conduct-gate-signals/src/composer.rs
// ============================================================================
// Module: Composite State Composer
// Description: Signal ingestion and fresh composite state assembly per agent.
// Purpose: Serialize per-agent composition and bound composite staleness.
// Dependencies: conduct-gate-core, crate::{inferencer, log, meter}
// ============================================================================

//! ## Overview
//! The composite composer owns one behavioral log per agent and assembles
//! phase-space states from the operational meter and virtue inferencer.
//! Composition is serialized per agent behind a per-agent mutex, which keeps
//! composite timestamps monotonic; different agents never contend beyond a
//! short registry lookup. A composite younger than the staleness bound is
//! reused instead of recomputed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use conduct_gate_core::ActionEvent;
use conduct_gate_core::ActionRef;
use conduct_gate_core::AgentId;
use conduct_gate_core::BehaviorSignal;
use conduct_gate_core::ComposeError;
use conduct_gate_core::ComposedState;
use conduct_gate_core::DIMENSION_COUNT;
use conduct_gate_core::OPERATIONAL_COUNT;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::PhaseState;
use conduct_gate_core::StateComposer;
use conduct_gate_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;

use crate::inferencer::InferencerConfig;
use crate::inferencer::VirtueInferencer;
use crate::log::BehaviorLog;
use crate::log::DEFAULT_RETENTION_MS;
use crate::meter::MeterConfig;
use crate::meter::MeterError;
use crate::meter::OperationalMeter;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default composite staleness bound in milliseconds.
pub const DEFAULT_STALENESS_MS: i64 = 500;

/// Signal layer configuration.
///
/// # Invariants
/// - `retention_ms` and `staleness_ms` are positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// Behavioral log retention window in milliseconds.
    pub retention_ms: i64,
    /// Maximum composite age reused without recomputation, in milliseconds.
    pub staleness_ms: i64,
    /// Operational meter tuning.
    pub meter: MeterConfig,
    /// Virtue inferencer tuning.
    pub inferencer: InferencerConfig,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            retention_ms: DEFAULT_RETENTION_MS,
            staleness_ms: DEFAULT_STALENESS_MS,
            meter: MeterConfig::default(),
            inferencer: InferencerConfig::default(),
        }
    }
}

// ============================================================================
// SECTION: Composer
// ============================================================================

/// Per-agent measurement cell.
#[derive(Debug)]
struct AgentCell {
    /// The agent's behavioral log.
    log: BehaviorLog,
    /// Last composed state, reused within the staleness bound.
    cached: Option<ComposedState>,
}

/// Assembles composite states and ingests behavioral signals.
pub struct CompositeComposer {
    /// Layer configuration.
    config: SignalsConfig,
    /// Operational meter.
    meter: OperationalMeter,
    /// Virtue inferencer.
    inferencer: VirtueInferencer,
    /// Per-agent cells behind a short registry lock.
    agents: Mutex<BTreeMap<AgentId, Arc<Mutex<AgentCell>>>>,
}

impl CompositeComposer {
    /// Creates a composer with the given configuration.
    #[must_use]
    pub fn new(config: SignalsConfig) -> Self {
        Self {
            meter: OperationalMeter::new(config.meter),
            inferencer: VirtueInferencer::new(config.inferencer),
            config,
            agents: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the layer configuration.
    #[must_use]
    pub const fn config(&self) -> &SignalsConfig {
        &self.config
    }

    /// Records an action event for the agent.
    pub fn record_action(&self, agent_id: &AgentId, now: Timestamp, action: ActionEvent) {
        self.append(agent_id, now, BehaviorSignal::Action(action));
    }

    /// Records a factual claim with its verification tag.
    pub fn record_claim(
        &self,
        agent_id: &AgentId,
        now: Timestamp,
        claim_ref: ActionRef,
        verified: bool,
    ) {
        self.append(agent_id, now, BehaviorSignal::Claim {
            claim_ref,
            verified,
        });
    }

    /// Records a commitment with its fulfillment tag.
    pub fn record_commitment(
        &self,
        agent_id: &AgentId,
        now: Timestamp,
        commitment_ref: ActionRef,
        fulfilled: bool,
    ) {
        self.append(agent_id, now, BehaviorSignal::Commitment {
            commitment_ref,
            fulfilled,
        });
    }

    /// Records a collaboration episode with its conflict score.
    pub fn record_collaboration(
        &self,
        agent_id: &AgentId,
        now: Timestamp,
        peers: Vec<AgentId>,
        conflict: f64,
    ) {
        self.append(agent_id, now, BehaviorSignal::collaboration(peers, conflict));
    }

    /// Records a credit-seeking event.
    pub fn record_credit_seek(&self, agent_id: &AgentId, now: Timestamp) {
        self.append(agent_id, now, BehaviorSignal::CreditSeek);
    }

    /// Records a comprehension event with its context depth score.
    pub fn record_comprehension(
        &self,
        agent_id: &AgentId,
        now: Timestamp,
        context_aware: bool,
        depth: f64,
    ) {
        self.append(agent_id, now, BehaviorSignal::comprehension(context_aware, depth));
    }

    /// Returns the number of retained signals for an agent.
    #[must_use]
    pub fn signal_count(&self, agent_id: &AgentId) -> usize {
        self.cell(agent_id)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log
            .len()
    }

    /// Appends a signal to the agent's log under its cell lock.
    fn append(&self, agent_id: &AgentId, now: Timestamp, signal: BehaviorSignal) {
        let cell = self.cell(agent_id);
        let mut cell = cell.lock().unwrap_or_else(PoisonError::into_inner);
        cell.log.append(now, signal);
        // New evidence invalidates the cached composite.
        cell.cached = None;
    }

    /// Returns the agent's cell, creating it on first use.
    fn cell(&self, agent_id: &AgentId) -> Arc<Mutex<AgentCell>> {
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(agents.entry(agent_id.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(AgentCell {
                log: BehaviorLog::new(self.config.retention_ms),
                cached: None,
            }))
        }))
    }
}

impl StateComposer for CompositeComposer {
    fn compose(&self, agent_id: &AgentId, now: Timestamp) -> Result<ComposedState, ComposeError> {
        let cell = self.cell(agent_id);
        let mut cell = cell
            .lock()
            .map_err(|_| ComposeError::Internal("agent cell mutex poisoned".to_string()))?;

        if let Some(cached) = &cell.cached {
            let age_ms = now.millis_since(cached.state.timestamp());
            if age_ms >= 0 && age_ms <= self.config.staleness_ms {
                return Ok(cached.clone());
            }
        }

        cell.log.prune(now);
        let (operational, operational_confidence, insufficient) =
            match self.meter.measure(&cell.log, now) {
                Ok(reading) => (reading.values, reading.confidence, false),
                Err(MeterError::InsufficientSignal) => {
                    (OperationalValues::uniform(0.5), [0.0; OPERATIONAL_COUNT], true)
                }
            };
        let virtue = self.inferencer.infer(&cell.log, now);

        let mut confidence = [0.0; DIMENSION_COUNT];
        confidence[.. OPERATIONAL_COUNT].copy_from_slice(&operational_confidence);
        confidence[OPERATIONAL_COUNT ..].copy_from_slice(&virtue.confidence);

        // Monotonic per-agent timestamps even if the host clock stalls.
        let timestamp = cell
            .cached
            .as_ref()
            .map_or(now, |cached| now.max(cached.state.timestamp()));

        let state = PhaseState::new(agent_id.clone(), timestamp, operational, virtue.values)
            .with_confidence(confidence);
        let composed = ComposedState {
            state,
            insufficient,
        };
        cell.cached = Some(composed.clone());
        Ok(composed)
    }
}
