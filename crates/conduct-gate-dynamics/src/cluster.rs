// crates/conduct-gate-dynamics/src/cluster.rs
// ============================================================================
// Module: Density Clustering
// Description: Deterministic density-based clustering over window vectors.
// Purpose: Discover stable behavioral attractors off the hot path.
// Dependencies: crate::windowing
// ============================================================================

//! ## Overview
//! A deterministic density-based clusterer: a point with at least
//! `min_samples` neighbors within `epsilon` (itself included) is a core
//! point; clusters grow from core points in input order, and expansion
//! visits neighbors in index order. Given identical inputs and parameters
//! the assignment is identical, which property tests rely on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::windowing::scaled_distance;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Clustering parameters in the scaled vector space.
///
/// # Invariants
/// - `epsilon` is positive; `min_samples` and `window_size` are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Neighborhood radius in the scaled space.
    pub epsilon: f64,
    /// Minimum neighborhood size (the point itself included) for a core point.
    pub min_samples: usize,
    /// States per trajectory window.
    pub window_size: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.3,
            min_samples: 5,
            window_size: 10,
        }
    }
}

// ============================================================================
// SECTION: Clustering
// ============================================================================

/// Point label during clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    /// Not yet visited.
    Unvisited,
    /// Visited but not density-reachable from any core point.
    Noise,
    /// Assigned to the cluster with the given index.
    Cluster(usize),
}

/// Clusters points and returns one optional cluster index per point.
///
/// Noise points map to `None`. Cluster indices are dense, starting at zero,
/// in order of discovery.
#[must_use]
pub fn cluster_assignments(
    points: &[Vec<f64>],
    epsilon: f64,
    min_samples: usize,
) -> Vec<Option<usize>> {
    let mut labels = vec![Label::Unvisited; points.len()];
    let mut next_cluster = 0usize;

    for index in 0 .. points.len() {
        if labels[index] != Label::Unvisited {
            continue;
        }
        let neighbors = region_query(points, index, epsilon);
        if neighbors.len() < min_samples.max(1) {
            labels[index] = Label::Noise;
            continue;
        }
        let cluster = next_cluster;
        next_cluster += 1;
        labels[index] = Label::Cluster(cluster);
        expand_cluster(points, &mut labels, neighbors, cluster, epsilon, min_samples);
    }

    labels
        .into_iter()
        .map(|label| match label {
            Label::Cluster(cluster) => Some(cluster),
            Label::Unvisited | Label::Noise => None,
        })
        .collect()
}

/// Grows one cluster from a seed neighborhood, visiting in index order.
fn expand_cluster(
    points: &[Vec<f64>],
    labels: &mut [Label],
    mut frontier: Vec<usize>,
    cluster: usize,
    epsilon: f64,
    min_samples: usize,
) {
    let mut cursor = 0usize;
    while cursor < frontier.len() {
        let candidate = frontier[cursor];
        cursor += 1;
        match labels[candidate] {
            Label::Cluster(_) => continue,
            Label::Noise => {
                // Border point: density-reachable but not core.
                labels[candidate] = Label::Cluster(cluster);
                continue;
            }
            Label::Unvisited => {
                labels[candidate] = Label::Cluster(cluster);
                let neighbors = region_query(points, candidate, epsilon);
                if neighbors.len() >= min_samples.max(1) {
                    for neighbor in neighbors {
                        if !frontier.contains(&neighbor) {
                            frontier.push(neighbor);
                        }
                    }
                }
            }
        }
    }
}

/// Returns indices within `epsilon` of the point, in ascending index order.
fn region_query(points: &[Vec<f64>], index: usize, epsilon: f64) -> Vec<usize> {
    let mut neighbors = Vec::new();
    for (candidate, point) in points.iter().enumerate() {
        if scaled_distance(&points[index], point) <= epsilon {
            neighbors.push(candidate);
        }
    }
    neighbors
}
