// crates/conduct-gate-core/src/core/state.rs
// ============================================================================
// Module: Conduct Gate Phase-Space State
// Description: Immutable 12-dimensional behavioral state with confidences.
// Purpose: Provide the canonical state record evaluated by the manifold and gate.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A phase-space state combines five operational scalars and seven virtue
//! scalars, each paired with a confidence value. All scalars live in [0, 1]
//! and are clamped at every construction boundary, including deserialization.
//! Non-finite inputs collapse to the 0.5 neutral midpoint so no downstream
//! arithmetic can observe NaN.
//!
//! Equality is structural over agent, dimensions, and confidences; timestamps
//! and the context side-channel are excluded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Scalar Guards
// ============================================================================

/// Total number of state dimensions.
pub const DIMENSION_COUNT: usize = 12;

/// Number of operational dimensions.
pub const OPERATIONAL_COUNT: usize = 5;

/// Number of virtue dimensions.
pub const VIRTUE_COUNT: usize = 7;

/// Clamps a scalar into [0, 1], collapsing non-finite input to the 0.5 midpoint.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.5 }
}

/// Clamps a signed scalar into [-1, 1], collapsing non-finite input to zero.
#[must_use]
pub fn clamp_signed_unit(value: f64) -> f64 {
    if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 }
}

// ============================================================================
// SECTION: Dimensions
// ============================================================================

/// Operational dimensions derived from the action event stream.
///
/// # Invariants
/// - Variants are stable for serialization and index mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalDim {
    /// Normalized actions-per-unit-time.
    Activity,
    /// Fraction of actions referencing at least one other agent.
    Coordination,
    /// Smoothed task success rate.
    Effectiveness,
    /// Smoothed normalized cost-per-action.
    Resource,
    /// One minus the smoothed error rate.
    Health,
}

impl OperationalDim {
    /// All operational dimensions in canonical order.
    pub const ALL: [Self; OPERATIONAL_COUNT] =
        [Self::Activity, Self::Coordination, Self::Effectiveness, Self::Resource, Self::Health];

    /// Returns the stable wire name of the dimension.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Coordination => "coordination",
            Self::Effectiveness => "effectiveness",
            Self::Resource => "resource",
            Self::Health => "health",
        }
    }

    /// Returns the canonical index within the 12-dimension layout.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Activity => 0,
            Self::Coordination => 1,
            Self::Effectiveness => 2,
            Self::Resource => 3,
            Self::Health => 4,
        }
    }
}

/// Virtue dimensions inferred from the behavioral log.
///
/// # Invariants
/// - Variants are stable for serialization and index mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtueDim {
    /// Verified-claim ratio with an unverified-claim penalty.
    Truthfulness,
    /// Fairness in resource and credit allocation.
    Justice,
    /// Fulfilled-commitment ratio with breach decay.
    Trustworthiness,
    /// Inverse normalized conflict, weighted by collaboration frequency.
    Unity,
    /// Benefit-to-others share of total benefit.
    Service,
    /// Inverse credit-seeking ratio.
    Detachment,
    /// Context-awareness rate weighted by depth.
    Understanding,
}

impl VirtueDim {
    /// All virtue dimensions in canonical order.
    pub const ALL: [Self; VIRTUE_COUNT] = [
        Self::Truthfulness,
        Self::Justice,
        Self::Trustworthiness,
        Self::Unity,
        Self::Service,
        Self::Detachment,
        Self::Understanding,
    ];

    /// Returns the stable wire name of the dimension.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Truthfulness => "truthfulness",
            Self::Justice => "justice",
            Self::Trustworthiness => "trustworthiness",
            Self::Unity => "unity",
            Self::Service => "service",
            Self::Detachment => "detachment",
            Self::Understanding => "understanding",
        }
    }

    /// Returns the canonical index within the 12-dimension layout.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Truthfulness => 5,
            Self::Justice => 6,
            Self::Trustworthiness => 7,
            Self::Unity => 8,
            Self::Service => 9,
            Self::Detachment => 10,
            Self::Understanding => 11,
        }
    }
}

/// Union over operational and virtue dimensions.
///
/// # Invariants
/// - The canonical index layout places operational dimensions first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "dim")]
pub enum Dimension {
    /// An operational dimension.
    Operational(OperationalDim),
    /// A virtue dimension.
    Virtue(VirtueDim),
}

impl Dimension {
    /// All twelve dimensions in canonical index order.
    pub const ALL: [Self; DIMENSION_COUNT] = [
        Self::Operational(OperationalDim::Activity),
        Self::Operational(OperationalDim::Coordination),
        Self::Operational(OperationalDim::Effectiveness),
        Self::Operational(OperationalDim::Resource),
        Self::Operational(OperationalDim::Health),
        Self::Virtue(VirtueDim::Truthfulness),
        Self::Virtue(VirtueDim::Justice),
        Self::Virtue(VirtueDim::Trustworthiness),
        Self::Virtue(VirtueDim::Unity),
        Self::Virtue(VirtueDim::Service),
        Self::Virtue(VirtueDim::Detachment),
        Self::Virtue(VirtueDim::Understanding),
    ];

    /// Returns the stable wire name of the dimension.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Operational(dim) => dim.name(),
            Self::Virtue(dim) => dim.name(),
        }
    }

    /// Returns the canonical index within the 12-dimension layout.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Operational(dim) => dim.index(),
            Self::Virtue(dim) => dim.index(),
        }
    }

    /// Resolves a dimension from its stable wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dim| dim.name() == name)
    }
}

// ============================================================================
// SECTION: Construction Values
// ============================================================================

/// Operational scalar bundle used for state construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationalValues {
    /// Normalized actions-per-unit-time.
    pub activity: f64,
    /// Fraction of actions referencing other agents.
    pub coordination: f64,
    /// Smoothed task success rate.
    pub effectiveness: f64,
    /// Smoothed normalized cost-per-action.
    pub resource: f64,
    /// One minus the smoothed error rate.
    pub health: f64,
}

impl OperationalValues {
    /// Returns a bundle with every operational scalar set to `value`.
    #[must_use]
    pub const fn uniform(value: f64) -> Self {
        Self {
            activity: value,
            coordination: value,
            effectiveness: value,
            resource: value,
            health: value,
        }
    }
}

/// Virtue scalar bundle used for state construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtueValues {
    /// Verified-claim ratio with penalty.
    pub truthfulness: f64,
    /// Fairness in allocation.
    pub justice: f64,
    /// Fulfilled-commitment ratio with breach decay.
    pub trustworthiness: f64,
    /// Inverse normalized conflict.
    pub unity: f64,
    /// Benefit-to-others share.
    pub service: f64,
    /// Inverse credit-seeking ratio.
    pub detachment: f64,
    /// Context-awareness rate weighted by depth.
    pub understanding: f64,
}

impl VirtueValues {
    /// Returns a bundle with every virtue scalar set to `value`.
    #[must_use]
    pub const fn uniform(value: f64) -> Self {
        Self {
            truthfulness: value,
            justice: value,
            trustworthiness: value,
            unity: value,
            service: value,
            detachment: value,
            understanding: value,
        }
    }
}

// ============================================================================
// SECTION: Phase-Space State
// ============================================================================

/// Immutable 12-dimensional behavioral state with per-dimension confidences.
///
/// # Invariants
/// - All dimension and confidence scalars are in [0, 1] after construction.
/// - Instances are never mutated; derivations go through `with_*` copies.
/// - Equality excludes `timestamp` and `context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PhaseStateWire")]
pub struct PhaseState {
    /// Agent this state describes.
    agent_id: AgentId,
    /// Timestamp the state was composed at.
    timestamp: Timestamp,
    /// Dimension scalars in canonical index order.
    dims: [f64; DIMENSION_COUNT],
    /// Per-dimension confidences in canonical index order.
    confidence: [f64; DIMENSION_COUNT],
    /// Bounded key/value side-channel; excluded from equality.
    context: BTreeMap<String, String>,
}

/// Wire form used to clamp scalars on deserialization.
#[derive(Deserialize)]
struct PhaseStateWire {
    /// Agent this state describes.
    agent_id: AgentId,
    /// Timestamp the state was composed at.
    timestamp: Timestamp,
    /// Dimension scalars in canonical index order.
    dims: [f64; DIMENSION_COUNT],
    /// Per-dimension confidences in canonical index order.
    confidence: [f64; DIMENSION_COUNT],
    /// Bounded key/value side-channel.
    #[serde(default)]
    context: BTreeMap<String, String>,
}

impl From<PhaseStateWire> for PhaseState {
    fn from(wire: PhaseStateWire) -> Self {
        Self {
            agent_id: wire.agent_id,
            timestamp: wire.timestamp,
            dims: wire.dims.map(clamp_unit),
            confidence: wire.confidence.map(clamp_unit),
            context: wire.context,
        }
    }
}

impl PhaseState {
    /// Creates a state from operational and virtue bundles.
    ///
    /// Scalars are clamped into [0, 1]; confidences start at 1.0 and the
    /// context starts empty.
    #[must_use]
    pub fn new(
        agent_id: AgentId,
        timestamp: Timestamp,
        operational: OperationalValues,
        virtues: VirtueValues,
    ) -> Self {
        let dims = [
            operational.activity,
            operational.coordination,
            operational.effectiveness,
            operational.resource,
            operational.health,
            virtues.truthfulness,
            virtues.justice,
            virtues.trustworthiness,
            virtues.unity,
            virtues.service,
            virtues.detachment,
            virtues.understanding,
        ]
        .map(clamp_unit);
        Self {
            agent_id,
            timestamp,
            dims,
            confidence: [1.0; DIMENSION_COUNT],
            context: BTreeMap::new(),
        }
    }

    /// Returns a copy with the given confidence vector, clamped into [0, 1].
    #[must_use]
    pub fn with_confidence(mut self, confidence: [f64; DIMENSION_COUNT]) -> Self {
        self.confidence = confidence.map(clamp_unit);
        self
    }

    /// Returns a copy with one dimension replaced by a clamped value.
    #[must_use]
    pub fn with_value(&self, dimension: Dimension, value: f64) -> Self {
        let mut next = self.clone();
        next.dims[dimension.index()] = clamp_unit(value);
        next
    }

    /// Returns a copy with the given timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns a copy with a context entry added.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the composition timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Returns the scalar for a dimension.
    #[must_use]
    pub const fn value(&self, dimension: Dimension) -> f64 {
        self.dims[dimension.index()]
    }

    /// Returns the scalar for a virtue dimension.
    #[must_use]
    pub const fn virtue(&self, dim: VirtueDim) -> f64 {
        self.dims[dim.index()]
    }

    /// Returns the scalar for an operational dimension.
    #[must_use]
    pub const fn operational(&self, dim: OperationalDim) -> f64 {
        self.dims[dim.index()]
    }

    /// Returns the confidence for a dimension.
    #[must_use]
    pub const fn confidence(&self, dimension: Dimension) -> f64 {
        self.confidence[dimension.index()]
    }

    /// Returns all dimension scalars in canonical index order.
    #[must_use]
    pub const fn values(&self) -> &[f64; DIMENSION_COUNT] {
        &self.dims
    }

    /// Returns all confidences in canonical index order.
    #[must_use]
    pub const fn confidences(&self) -> &[f64; DIMENSION_COUNT] {
        &self.confidence
    }

    /// Returns the context side-channel.
    #[must_use]
    pub const fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Returns the mean confidence across all dimensions.
    #[must_use]
    pub fn mean_confidence(&self) -> f64 {
        #[allow(clippy::cast_precision_loss, reason = "Dimension count is a small constant.")]
        let mean = self.confidence.iter().sum::<f64>() / DIMENSION_COUNT as f64;
        clamp_unit(mean)
    }

    /// Returns the Euclidean distance to another state.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.weighted_distance(other, &[1.0; DIMENSION_COUNT])
    }

    /// Returns the weighted Euclidean distance to another state.
    ///
    /// Negative or non-finite weights are treated as zero; a non-finite
    /// accumulation collapses to zero rather than propagating NaN.
    #[must_use]
    pub fn weighted_distance(&self, other: &Self, weights: &[f64; DIMENSION_COUNT]) -> f64 {
        let mut sum = 0.0;
        for index in 0 .. DIMENSION_COUNT {
            let weight = if weights[index].is_finite() { weights[index].max(0.0) } else { 0.0 };
            let delta = self.dims[index] - other.dims[index];
            sum += weight * delta * delta;
        }
        let distance = sum.sqrt();
        if distance.is_finite() { distance } else { 0.0 }
    }
}

impl PartialEq for PhaseState {
    fn eq(&self, other: &Self) -> bool {
        self.agent_id == other.agent_id
            && self.dims == other.dims
            && self.confidence == other.confidence
    }
}
