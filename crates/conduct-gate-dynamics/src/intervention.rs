// crates/conduct-gate-dynamics/src/intervention.rs
// ============================================================================
// Module: Intervention Manager
// Description: Attractor-aware intervention advice with tenure tracking.
// Purpose: Implement the advisor interface consulted after every gate call.
// Dependencies: conduct-gate-core, crate::engine
// ============================================================================

//! ## Overview
//! The intervention manager resolves the attractor basin an agent currently
//! sits in, tracks how long the agent has inhabited it, and maps the
//! classification and tenure through the escalation ladder. Tenure is kept
//! per (agent, attractor); entries whose attractor retired with an old
//! generation are pruned on sight. Advice never influences the admission
//! decision of the call that requested it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use conduct_gate_core::AdvisorError;
use conduct_gate_core::AgentId;
use conduct_gate_core::AttractorId;
use conduct_gate_core::Intervention;
use conduct_gate_core::InterventionAdvisor;
use conduct_gate_core::InterventionPolicy;
use conduct_gate_core::PhaseState;
use conduct_gate_core::Timestamp;
use conduct_gate_core::decide_intervention;

use crate::engine::AttractorEngine;

// ============================================================================
// SECTION: Intervention Manager
// ============================================================================

/// Advises interventions from attractor membership and tenure.
pub struct InterventionManager {
    /// Attractor engine providing the current snapshot.
    engine: Arc<AttractorEngine>,
    /// Escalation policy.
    policy: InterventionPolicy,
    /// First-seen timestamps per (agent, attractor).
    tenure: Mutex<BTreeMap<(AgentId, AttractorId), Timestamp>>,
}

impl InterventionManager {
    /// Creates a manager over the given engine and policy.
    #[must_use]
    pub fn new(engine: Arc<AttractorEngine>, policy: InterventionPolicy) -> Self {
        Self {
            engine,
            policy,
            tenure: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the escalation policy.
    #[must_use]
    pub const fn policy(&self) -> &InterventionPolicy {
        &self.policy
    }

    /// Returns the tenure in milliseconds an agent has held in an attractor.
    #[must_use]
    pub fn tenure_ms(&self, agent_id: &AgentId, attractor_id: &AttractorId, now: Timestamp) -> i64 {
        let tenure = self.tenure.lock().unwrap_or_else(PoisonError::into_inner);
        tenure
            .get(&(agent_id.clone(), attractor_id.clone()))
            .map_or(0, |first_seen| now.millis_since(*first_seen))
    }

    /// Drops tenure entries whose attractor no longer exists.
    fn prune_retired(&self) {
        let snapshot = self.engine.snapshot();
        let mut tenure = self.tenure.lock().unwrap_or_else(PoisonError::into_inner);
        tenure.retain(|(_, attractor_id), _| snapshot.attractor(attractor_id).is_some());
    }
}

impl InterventionAdvisor for InterventionManager {
    fn advise(
        &self,
        agent_id: &AgentId,
        state: &PhaseState,
        residual_violations: usize,
        now: Timestamp,
    ) -> Result<Option<Intervention>, AdvisorError> {
        self.prune_retired();
        let Some((attractor, _distance)) = self.engine.nearest_basin(state) else {
            return Ok(None);
        };

        let first_seen = {
            let mut tenure = self.tenure.lock().unwrap_or_else(PoisonError::into_inner);
            *tenure.entry((agent_id.clone(), attractor.id.clone())).or_insert(now)
        };
        let tenure_ms = now.millis_since(first_seen);

        let kind = decide_intervention(
            &self.policy,
            Some(attractor.classification),
            attractor.kill_switch,
            tenure_ms,
            residual_violations,
        );
        Ok(kind.map(|kind| Intervention {
            kind,
            attractor_id: Some(attractor.id),
            issued_at: now,
        }))
    }
}
