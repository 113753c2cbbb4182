// crates/conduct-gate-dynamics/src/windowing.rs
// ============================================================================
// Module: Trajectory Windowing
// Description: Fixed-width vectors over sliding trajectory windows.
// Purpose: Feed density clustering with scaled, deterministic inputs.
// Dependencies: conduct-gate-core
// ============================================================================

//! ## Overview
//! Attractor discovery operates on fixed-width vectors: `W` consecutive
//! 12-dimension states concatenated into one point. Distances are scaled by
//! the square root of the vector length so the clustering radius is
//! comparable across window sizes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use conduct_gate_core::AgentId;
use conduct_gate_core::DIMENSION_COUNT;
use conduct_gate_core::TrajectoryWindow;

// ============================================================================
// SECTION: Window Vectors
// ============================================================================

/// One clustering input point derived from a trajectory window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowVector {
    /// Agent the window belongs to.
    pub agent_id: AgentId,
    /// Concatenated dimension scalars, `12 × W` wide.
    pub vector: Vec<f64>,
    /// Mean state over the window, in canonical dimension order.
    pub mean: [f64; DIMENSION_COUNT],
}

/// Builds clustering points from trajectory windows.
///
/// Windows narrower than `window_size` are skipped; the output order follows
/// the input order, which keeps clustering deterministic.
#[must_use]
pub fn window_vectors(windows: &[TrajectoryWindow], window_size: usize) -> Vec<WindowVector> {
    let mut out = Vec::with_capacity(windows.len());
    for window in windows {
        if window.states.len() != window_size || window_size == 0 {
            continue;
        }
        let mut vector = Vec::with_capacity(DIMENSION_COUNT * window_size);
        let mut mean = [0.0; DIMENSION_COUNT];
        for state in &window.states {
            let values = state.values();
            vector.extend_from_slice(values);
            for (slot, value) in mean.iter_mut().zip(values) {
                *slot += value;
            }
        }
        #[allow(clippy::cast_precision_loss, reason = "Window sizes are small constants.")]
        let count = window_size as f64;
        for slot in &mut mean {
            *slot /= count;
        }
        out.push(WindowVector {
            agent_id: window.agent_id.clone(),
            vector,
            mean,
        });
    }
    out
}

/// Scaled Euclidean distance between two equal-length vectors.
///
/// The raw distance is divided by the square root of the vector length, so a
/// clustering radius expressed per dimension applies uniformly. Mismatched
/// lengths yield the maximum distance, which keeps them out of every
/// neighborhood.
#[must_use]
pub fn scaled_distance(left: &[f64], right: &[f64]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return f64::MAX;
    }
    let mut sum = 0.0;
    for (a, b) in left.iter().zip(right) {
        let delta = a - b;
        sum += delta * delta;
    }
    #[allow(clippy::cast_precision_loss, reason = "Vector lengths are small constants.")]
    let scale = (left.len() as f64).sqrt();
    let distance = sum.sqrt() / scale;
    if distance.is_finite() { distance } else { f64::MAX }
}
