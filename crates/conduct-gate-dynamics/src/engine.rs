// crates/conduct-gate-dynamics/src/engine.rs
// ============================================================================
// Module: Attractor Engine
// Description: Periodic attractor discovery, classification, and publication.
// Purpose: Maintain an atomically swapped attractor snapshot off the hot path.
// Dependencies: conduct-gate-core, crate::{classify, cluster, windowing}
// ============================================================================

//! ## Overview
//! The attractor engine reads recent trajectory windows, clusters them,
//! classifies each cluster from outcome feedback, and publishes the result
//! as a new snapshot generation. Publication is a single `Arc` swap behind a
//! write lock: readers clone the current `Arc` and never observe a mixed
//! generation. Attractor centers are projected onto the base manifold before
//! recording, so every published center is a valid state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;

use conduct_gate_core::AgentId;
use conduct_gate_core::Attractor;
use conduct_gate_core::AttractorId;
use conduct_gate_core::AttractorSnapshot;
use conduct_gate_core::DIMENSION_COUNT;
use conduct_gate_core::Deadline;
use conduct_gate_core::Manifold;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::OutcomeFeedback;
use conduct_gate_core::PhaseState;
use conduct_gate_core::Projection;
use conduct_gate_core::ProjectionConfig;
use conduct_gate_core::Timestamp;
use conduct_gate_core::TrajectoryStore;
use conduct_gate_core::TrajectoryStoreError;
use conduct_gate_core::VirtueValues;
use conduct_gate_core::clamp_unit;
use conduct_gate_core::project;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::classify::ClassifierConfig;
use crate::classify::classify;
use crate::cluster::ClusteringConfig;
use crate::cluster::cluster_assignments;
use crate::windowing::WindowVector;
use crate::windowing::scaled_distance;
use crate::windowing::window_vectors;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Attractor engine configuration.
///
/// # Invariants
/// - `recompute_period_ms` is positive.
/// - `feedback_retention` is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsConfig {
    /// Clustering parameters.
    pub clustering: ClusteringConfig,
    /// Classification thresholds.
    pub classifier: ClassifierConfig,
    /// Recompute cadence in milliseconds.
    pub recompute_period_ms: i64,
    /// Maximum retained feedback records per agent.
    pub feedback_retention: usize,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            clustering: ClusteringConfig::default(),
            classifier: ClassifierConfig::default(),
            recompute_period_ms: 300_000,
            feedback_retention: 1_024,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Attractor engine errors.
#[derive(Debug, Error)]
pub enum DynamicsError {
    /// Trajectory store operation failed.
    #[error(transparent)]
    Store(#[from] TrajectoryStoreError),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Discovers, classifies, and publishes behavioral attractors.
pub struct AttractorEngine {
    /// Engine configuration.
    config: DynamicsConfig,
    /// Manifold used to keep centers in the valid region.
    manifold: Arc<Manifold>,
    /// Current snapshot; swapped wholesale under the write lock.
    snapshot: RwLock<Arc<AttractorSnapshot>>,
    /// Retained outcome feedback per agent.
    feedback: Mutex<BTreeMap<AgentId, Vec<OutcomeFeedback>>>,
}

impl AttractorEngine {
    /// Creates an engine with an empty generation-zero snapshot.
    #[must_use]
    pub fn new(config: DynamicsConfig, manifold: Arc<Manifold>) -> Self {
        Self {
            config,
            manifold,
            snapshot: RwLock::new(Arc::new(AttractorSnapshot::empty(
                0,
                Timestamp::from_unix_millis(0),
            ))),
            feedback: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates an engine seeded from the store's latest persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::Store`] when the snapshot cannot be read.
    pub fn with_persisted(
        config: DynamicsConfig,
        manifold: Arc<Manifold>,
        store: &impl TrajectoryStore,
    ) -> Result<Self, DynamicsError> {
        let engine = Self::new(config, manifold);
        if let Some(snapshot) = store.latest_snapshot()? {
            let mut guard = engine.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::new(snapshot);
        }
        Ok(engine)
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &DynamicsConfig {
        &self.config
    }

    /// Records outcome feedback for later classification.
    pub fn record_outcome(&self, feedback: OutcomeFeedback) {
        let mut retained = self.feedback.lock().unwrap_or_else(PoisonError::into_inner);
        let log = retained.entry(feedback.agent_id.clone()).or_default();
        log.push(feedback);
        let overflow = log.len().saturating_sub(self.config.feedback_retention.max(1));
        if overflow > 0 {
            log.drain(.. overflow);
        }
    }

    /// Returns the current snapshot; readers never block recomputation.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AttractorSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns whether a recompute is due at `now`.
    #[must_use]
    pub fn recompute_due(&self, now: Timestamp) -> bool {
        let snapshot = self.snapshot();
        now.millis_since(snapshot.computed_at) >= self.config.recompute_period_ms
    }

    /// Resolves the attractor basin a state currently sits in, if any.
    ///
    /// The basin test uses the scaled center distance against the attractor
    /// radius, floored at the clustering epsilon so point-tight clusters
    /// still have a nonzero basin.
    #[must_use]
    pub fn nearest_basin(&self, state: &PhaseState) -> Option<(Attractor, f64)> {
        let snapshot = self.snapshot();
        let mut best: Option<(Attractor, f64)> = None;
        for attractor in &snapshot.attractors {
            let distance = scaled_distance(state.values(), &attractor.center);
            if distance > attractor.radius.max(self.config.clustering.epsilon) {
                continue;
            }
            if best.as_ref().is_none_or(|(_, best_distance)| distance < *best_distance) {
                best = Some((attractor.clone(), distance));
            }
        }
        best
    }

    /// Recomputes the attractor set and publishes a new generation.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::Store`] when trajectory windows cannot be
    /// read or the snapshot cannot be persisted.
    pub fn recompute(
        &self,
        store: &impl TrajectoryStore,
        now: Timestamp,
    ) -> Result<Arc<AttractorSnapshot>, DynamicsError> {
        let windows = store.all_trajectories(self.config.clustering.window_size)?;
        let vectors = window_vectors(&windows, self.config.clustering.window_size);
        let points: Vec<Vec<f64>> = vectors.iter().map(|vector| vector.vector.clone()).collect();
        let assignments = cluster_assignments(
            &points,
            self.config.clustering.epsilon,
            self.config.clustering.min_samples,
        );

        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, assignment) in assignments.iter().enumerate() {
            if let Some(cluster) = assignment {
                clusters.entry(*cluster).or_default().push(index);
            }
        }

        let previous = self.snapshot();
        let generation = previous.generation + 1;
        let retained = self.feedback.lock().unwrap_or_else(PoisonError::into_inner);

        let mut attractors = Vec::with_capacity(clusters.len());
        for (cluster, members) in &clusters {
            if let Some(attractor) = self.build_attractor(
                generation,
                *cluster,
                members,
                &vectors,
                &previous,
                &retained,
                now,
            ) {
                attractors.push(attractor);
            }
        }
        drop(retained);

        let snapshot = AttractorSnapshot {
            format_version: previous.format_version,
            generation,
            computed_at: now,
            attractors,
        };
        store.publish_snapshot(&snapshot)?;
        let published = Arc::new(snapshot);
        {
            let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::clone(&published);
        }
        Ok(published)
    }

    /// Sets or clears the kill switch on an attractor, republishing.
    ///
    /// Returns `false` when the attractor does not exist in the current
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::Store`] when the snapshot cannot be
    /// persisted.
    pub fn set_kill_switch(
        &self,
        store: &impl TrajectoryStore,
        id: &AttractorId,
        engaged: bool,
        now: Timestamp,
    ) -> Result<bool, DynamicsError> {
        let current = self.snapshot();
        if current.attractor(id).is_none() {
            return Ok(false);
        }
        let mut next = (*current).clone();
        next.generation = current.generation + 1;
        next.computed_at = now;
        for attractor in &mut next.attractors {
            if &attractor.id == id {
                attractor.kill_switch = engaged;
            }
        }
        store.publish_snapshot(&next)?;
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
        Ok(true)
    }

    /// Builds one attractor record from a cluster's member windows.
    #[allow(clippy::too_many_arguments, reason = "Private assembly helper for recompute.")]
    fn build_attractor(
        &self,
        generation: u64,
        cluster: usize,
        members: &[usize],
        vectors: &[WindowVector],
        previous: &AttractorSnapshot,
        retained: &BTreeMap<AgentId, Vec<OutcomeFeedback>>,
        now: Timestamp,
    ) -> Option<Attractor> {
        let mut raw_center = [0.0; DIMENSION_COUNT];
        for member in members {
            for (slot, value) in raw_center.iter_mut().zip(vectors[*member].mean) {
                *slot += value;
            }
        }
        #[allow(clippy::cast_precision_loss, reason = "Cluster sizes are far below 2^52.")]
        let count = members.len() as f64;
        for slot in &mut raw_center {
            *slot /= count;
        }

        // Centers must live in the valid region of the base manifold.
        let center_state = state_from_dims(&raw_center);
        let projected = match project(
            &self.manifold,
            &center_state,
            &ProjectionConfig::default(),
            &Deadline::none(),
        ) {
            Projection::Unchanged(state) | Projection::Repaired {
                state, ..
            } => state,
            Projection::Failed {
                ..
            }
            | Projection::TimedOut {
                ..
            } => return None,
        };
        let center = *projected.values();

        let mut radius = 0.0f64;
        let mut distance_sum = 0.0f64;
        let mut agent_ids: BTreeSet<AgentId> = BTreeSet::new();
        for member in members {
            let distance = scaled_distance(&vectors[*member].mean, &center);
            radius = radius.max(distance);
            distance_sum += distance;
            agent_ids.insert(vectors[*member].agent_id.clone());
        }
        let mean_distance = distance_sum / count;
        let stability =
            clamp_unit(1.0 - mean_distance / self.config.clustering.epsilon.max(f64::EPSILON));

        let feedback: Vec<&OutcomeFeedback> = agent_ids
            .iter()
            .filter_map(|agent_id| retained.get(agent_id))
            .flat_map(|log| log.iter())
            .collect();
        let classification = classify(&self.config.classifier, &feedback);

        let kill_switch = previous.attractors.iter().any(|prior| {
            prior.kill_switch
                && scaled_distance(&prior.center, &center) <= self.config.clustering.epsilon
        });

        Some(Attractor {
            id: AttractorId::new(format!("attractor-{generation}-{cluster}")),
            center,
            radius,
            member_count: members.len(),
            agent_ids: agent_ids.into_iter().collect(),
            classification,
            stability,
            discovered_at: now,
            kill_switch,
        })
    }
}

/// Builds a synthetic state carrying the given dimension scalars.
fn state_from_dims(dims: &[f64; DIMENSION_COUNT]) -> PhaseState {
    PhaseState::new(
        AgentId::new("attractor-center"),
        Timestamp::from_unix_millis(0),
        OperationalValues {
            activity: dims[0],
            coordination: dims[1],
            effectiveness: dims[2],
            resource: dims[3],
            health: dims[4],
        },
        VirtueValues {
            truthfulness: dims[5],
            justice: dims[6],
            trustworthiness: dims[7],
            unity: dims[8],
            service: dims[9],
            detachment: dims[10],
            understanding: dims[11],
        },
    )
}
