// crates/conduct-gate-dynamics/src/calibration.rs
// ============================================================================
// Module: Calibration Monitor
// Description: Rolling correlation between virtue values and outcome scores.
// Purpose: Surface drift advisories without ever changing gate behavior.
// Dependencies: conduct-gate-core
// ============================================================================

//! ## Overview
//! The calibration monitor watches whether virtue dimensions still predict
//! outcomes. For each virtue it keeps a rolling window of (value at decision
//! time, outcome score) pairs and computes the Pearson correlation. When the
//! correlation falls below the configured floor with enough samples, it
//! emits a rate-limited advisory. Advisories are informational: thresholds
//! never change automatically, keeping normative choices explicit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;

use conduct_gate_core::Dimension;
use conduct_gate_core::OutcomeFeedback;
use conduct_gate_core::Timestamp;
use conduct_gate_core::VIRTUE_COUNT;
use conduct_gate_core::VirtueDim;
use conduct_gate_core::clamp_unit;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Calibration monitor configuration.
///
/// # Invariants
/// - `sample_floor` is at least 2; `drift_window` is at least `sample_floor`.
/// - `rho_min` is in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Correlation floor below which an advisory is emitted.
    pub rho_min: f64,
    /// Minimum samples before any advisory may be emitted.
    pub sample_floor: usize,
    /// Rolling window length in samples.
    pub drift_window: usize,
    /// Minimum samples between advisories for the same dimension.
    pub advisory_cooldown: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            rho_min: 0.1,
            sample_floor: 30,
            drift_window: 500,
            advisory_cooldown: 500,
        }
    }
}

// ============================================================================
// SECTION: Advisories
// ============================================================================

/// Advisory emitted when a virtue dimension stops predicting outcomes.
///
/// # Invariants
/// - Advisories never change thresholds or gate behavior on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationAdvisory {
    /// Virtue dimension that drifted.
    pub dimension: VirtueDim,
    /// Observed rolling correlation.
    pub correlation: f64,
    /// Samples the correlation was computed over.
    pub samples: usize,
    /// Emission timestamp.
    pub issued_at: Timestamp,
}

// ============================================================================
// SECTION: Monitor
// ============================================================================

/// One rolling (virtue value, outcome score) sample.
#[derive(Debug, Clone, Copy)]
struct CalibrationSample {
    /// Virtue values at decision time, canonical virtue order.
    virtues: [f64; VIRTUE_COUNT],
    /// Aggregated outcome score.
    score: f64,
}

/// Mutable monitor contents behind the mutex.
#[derive(Debug, Default)]
struct MonitorInner {
    /// Rolling sample window, oldest first.
    samples: VecDeque<CalibrationSample>,
    /// Total samples ever ingested.
    ingested: usize,
    /// Ingestion count at the last advisory per dimension.
    last_advisory: BTreeMap<VirtueDim, usize>,
}

/// Watches virtue/outcome correlation and emits drift advisories.
#[derive(Debug, Default)]
pub struct CalibrationMonitor {
    /// Monitor configuration.
    config: CalibrationConfig,
    /// Rolling state.
    inner: Mutex<MonitorInner>,
}

impl CalibrationMonitor {
    /// Creates a monitor with the given configuration.
    #[must_use]
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    /// Returns the monitor configuration.
    #[must_use]
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Ingests one feedback record and returns any advisories it triggers.
    pub fn ingest(&self, feedback: &OutcomeFeedback, now: Timestamp) -> Vec<CalibrationAdvisory> {
        let mut virtues = [0.0; VIRTUE_COUNT];
        for (slot, dim) in virtues.iter_mut().zip(VirtueDim::ALL) {
            *slot = feedback.state_at_action.value(Dimension::Virtue(dim));
        }
        let sample = CalibrationSample {
            virtues,
            score: outcome_score(feedback),
        };

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.samples.push_back(sample);
        inner.ingested += 1;
        while inner.samples.len() > self.config.drift_window.max(2) {
            inner.samples.pop_front();
        }
        if inner.samples.len() < self.config.sample_floor.max(2) {
            return Vec::new();
        }

        let mut advisories = Vec::new();
        for (index, dim) in VirtueDim::ALL.into_iter().enumerate() {
            let cooled = inner.last_advisory.get(&dim).is_none_or(|last| {
                inner.ingested - last >= self.config.advisory_cooldown.max(1)
            });
            if !cooled {
                continue;
            }
            let values: Vec<f64> =
                inner.samples.iter().map(|sample| sample.virtues[index]).collect();
            let scores: Vec<f64> = inner.samples.iter().map(|sample| sample.score).collect();
            let Some(correlation) = pearson(&values, &scores) else {
                continue;
            };
            if correlation < self.config.rho_min {
                let ingested = inner.ingested;
                inner.last_advisory.insert(dim, ingested);
                advisories.push(CalibrationAdvisory {
                    dimension: dim,
                    correlation,
                    samples: inner.samples.len(),
                    issued_at: now,
                });
            }
        }
        advisories
    }
}

/// Collapses a feedback record into one outcome score in [0, 1].
///
/// Effectiveness and sentiment weigh in positively; any security event
/// applies a fixed penalty.
#[must_use]
pub fn outcome_score(feedback: &OutcomeFeedback) -> f64 {
    let sentiment = (feedback.user_feedback + 1.0) / 2.0;
    let incident_penalty = if feedback.security_events > 0 { 0.25 } else { 0.0 };
    clamp_unit(0.6 * feedback.effectiveness + 0.4 * sentiment - incident_penalty)
}

/// Pearson correlation; `None` when either series has no variance.
fn pearson(left: &[f64], right: &[f64]) -> Option<f64> {
    if left.len() != right.len() || left.len() < 2 {
        return None;
    }
    #[allow(clippy::cast_precision_loss, reason = "Window lengths are small.")]
    let count = left.len() as f64;
    let left_mean = left.iter().sum::<f64>() / count;
    let right_mean = right.iter().sum::<f64>() / count;
    let mut covariance = 0.0;
    let mut left_variance = 0.0;
    let mut right_variance = 0.0;
    for (a, b) in left.iter().zip(right) {
        let da = a - left_mean;
        let db = b - right_mean;
        covariance += da * db;
        left_variance += da * da;
        right_variance += db * db;
    }
    let denominator = (left_variance * right_variance).sqrt();
    if denominator <= f64::EPSILON {
        return None;
    }
    let correlation = covariance / denominator;
    if correlation.is_finite() { Some(correlation) } else { None }
}
