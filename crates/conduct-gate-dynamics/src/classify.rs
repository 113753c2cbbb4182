// crates/conduct-gate-dynamics/src/classify.rs
// ============================================================================
// Module: Attractor Classification
// Description: Outcome-driven labeling of discovered attractors.
// Purpose: Classify attractors deterministically from aggregated feedback.
// Dependencies: conduct-gate-core
// ============================================================================

//! ## Overview
//! Attractors are labeled from the aggregated outcome feedback of their
//! member agents. An attractor is beneficial only when it is effective,
//! well-received, incident-free, and cost-acceptable after discounting cost
//! by task complexity and urgency; it is detrimental when incidents, strong
//! negative sentiment, or low effectiveness appear. Classification is a pure
//! function of the feedback set and thresholds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use conduct_gate_core::AttractorClassification;
use conduct_gate_core::OutcomeFeedback;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Classification thresholds.
///
/// # Invariants
/// - `tau_low < tau_eff`; `tau_fb` is positive; thresholds are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Mean effectiveness floor for a beneficial label.
    pub tau_eff: f64,
    /// Mean user-feedback floor for beneficial (and ceiling, negated, for
    /// detrimental).
    pub tau_fb: f64,
    /// Mean effectiveness at or below which an attractor is detrimental.
    pub tau_low: f64,
    /// Discounted cost ceiling for a beneficial label.
    pub tau_cost: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tau_eff: 0.7,
            tau_fb: 0.3,
            tau_low: 0.3,
            tau_cost: 0.7,
        }
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Aggregated means used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackAggregate {
    /// Mean effectiveness.
    pub effectiveness: f64,
    /// Mean user feedback.
    pub user_feedback: f64,
    /// Mean security event count.
    pub security_events: f64,
    /// Mean complexity- and urgency-discounted cost.
    pub adjusted_cost: f64,
    /// Number of feedback records aggregated.
    pub samples: usize,
}

/// Aggregates a feedback set into classifier means.
#[must_use]
pub fn aggregate(feedback: &[&OutcomeFeedback]) -> FeedbackAggregate {
    if feedback.is_empty() {
        return FeedbackAggregate {
            effectiveness: 0.0,
            user_feedback: 0.0,
            security_events: 0.0,
            adjusted_cost: 0.0,
            samples: 0,
        };
    }
    let mut effectiveness = 0.0;
    let mut user_feedback = 0.0;
    let mut security_events = 0.0;
    let mut adjusted_cost = 0.0;
    for record in feedback {
        effectiveness += record.effectiveness;
        user_feedback += record.user_feedback;
        security_events += f64::from(record.security_events);
        adjusted_cost += record.adjusted_cost();
    }
    #[allow(clippy::cast_precision_loss, reason = "Feedback sets are far below 2^52 records.")]
    let count = feedback.len() as f64;
    FeedbackAggregate {
        effectiveness: effectiveness / count,
        user_feedback: user_feedback / count,
        security_events: security_events / count,
        adjusted_cost: adjusted_cost / count,
        samples: feedback.len(),
    }
}

/// Classifies an attractor from its members' aggregated feedback.
///
/// An attractor with no feedback at all is neutral.
#[must_use]
pub fn classify(
    config: &ClassifierConfig,
    feedback: &[&OutcomeFeedback],
) -> AttractorClassification {
    let means = aggregate(feedback);
    if means.samples == 0 {
        return AttractorClassification::Neutral;
    }
    let cost_is_acceptable = means.adjusted_cost <= config.tau_cost;
    if means.effectiveness >= config.tau_eff
        && means.user_feedback >= config.tau_fb
        && means.security_events == 0.0
        && cost_is_acceptable
    {
        return AttractorClassification::Beneficial;
    }
    if means.security_events > 0.0
        || means.user_feedback <= -config.tau_fb
        || means.effectiveness <= config.tau_low
    {
        return AttractorClassification::Detrimental;
    }
    AttractorClassification::Neutral
}
