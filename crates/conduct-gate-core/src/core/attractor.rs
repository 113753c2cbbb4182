// crates/conduct-gate-core/src/core/attractor.rs
// ============================================================================
// Module: Conduct Gate Attractor Records
// Description: Discovered behavioral attractors and versioned snapshots.
// Purpose: Provide stable records for attractor publication and intervention lookup.
// Dependencies: crate::core::{identifiers, state, time}, serde
// ============================================================================

//! ## Overview
//! Attractors are density clusters discovered over trajectory windows and
//! classified from outcome feedback. A snapshot is the atomic unit of
//! publication: readers always observe one complete generation, and stores
//! reject snapshots written by a future format version.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::AttractorId;
use crate::core::state::DIMENSION_COUNT;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Outcome-based classification of an attractor.
///
/// # Invariants
/// - Variants are stable for serialization; classification is deterministic
///   given identical member feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttractorClassification {
    /// Effective, well-received, incident-free, and cost-acceptable.
    Beneficial,
    /// Neither beneficial nor detrimental.
    Neutral,
    /// Incident-bearing, poorly received, or ineffective.
    Detrimental,
}

// ============================================================================
// SECTION: Attractors
// ============================================================================

/// A stable behavioral attractor discovered by clustering.
///
/// # Invariants
/// - `center` always satisfies the base manifold (projected before recording).
/// - Attractors hold agent identifiers only; membership resolution lives in
///   the attractor engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attractor {
    /// Attractor identifier, unique within its generation.
    pub id: AttractorId,
    /// Cluster center in the 12-dimension state space.
    pub center: [f64; DIMENSION_COUNT],
    /// Maximum member distance from the center.
    pub radius: f64,
    /// Number of member windows.
    pub member_count: usize,
    /// Agents whose windows belong to the cluster.
    pub agent_ids: Vec<AgentId>,
    /// Outcome-based classification.
    pub classification: AttractorClassification,
    /// Cohesion score in [0, 1]; higher is tighter.
    pub stability: f64,
    /// Discovery timestamp.
    pub discovered_at: Timestamp,
    /// Operator kill-switch: forces a block intervention regardless of tenure.
    pub kill_switch: bool,
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Current snapshot blob format version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Atomic, generation-numbered attractor snapshot.
///
/// # Invariants
/// - `generation` is monotonic per engine instance; replacement is atomic.
/// - Readers must reject snapshots with `format_version` greater than
///   [`SNAPSHOT_FORMAT_VERSION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractorSnapshot {
    /// Snapshot blob format version.
    pub format_version: u32,
    /// Monotonic generation number.
    pub generation: u64,
    /// Recompute timestamp.
    pub computed_at: Timestamp,
    /// Discovered attractors.
    pub attractors: Vec<Attractor>,
}

impl AttractorSnapshot {
    /// Creates an empty snapshot for the given generation.
    #[must_use]
    pub const fn empty(generation: u64, computed_at: Timestamp) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            generation,
            computed_at,
            attractors: Vec::new(),
        }
    }

    /// Looks up an attractor by identifier.
    #[must_use]
    pub fn attractor(&self, id: &AttractorId) -> Option<&Attractor> {
        self.attractors.iter().find(|attractor| &attractor.id == id)
    }
}
