// crates/conduct-gate-signals/src/inferencer.rs
// ============================================================================
// Module: Virtue Inferencer
// Description: Derive the seven virtue dimensions from the behavioral log.
// Purpose: Produce virtue readings with saturating confidences, never blocking.
// Dependencies: conduct-gate-core, crate::{log, meter}
// ============================================================================

//! ## Overview
//! The virtue inferencer combines multi-signal evidence into seven scalars.
//! Absent signals never block inference: a virtue with no evidence sits at
//! the 0.5 midpoint with zero confidence. Each combination below states the
//! contract it implements:
//!
//! - truthfulness: verified-claim ratio, penalized quadratically once the
//!   unverified share exceeds the 30% knee;
//! - justice: benefit-split fairness across actions, blended with
//!   awareness-of-asymmetry markers when present;
//! - trustworthiness: fulfilled-commitment ratio scaled by recency-weighted
//!   breach decay;
//! - unity: inverse mean conflict, weighted by collaboration frequency;
//! - service: benefit-to-others share of total benefit;
//! - detachment: inverse credit-seeking ratio (not outcome indifference);
//! - understanding: context-awareness rate weighted by depth.

// ============================================================================
// SECTION: Imports
// ============================================================================

use conduct_gate_core::BehaviorSignal;
use conduct_gate_core::Timestamp;
use conduct_gate_core::VIRTUE_COUNT;
use conduct_gate_core::VirtueValues;
use conduct_gate_core::clamp_unit;
use serde::Deserialize;
use serde::Serialize;

use crate::log::BehaviorLog;
use crate::meter::saturating_confidence;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Virtue inferencer tuning parameters.
///
/// # Invariants
/// - `k_min` is at least 1.
/// - `unverified_knee` is in [0, 1); `breach_alpha` is in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferencerConfig {
    /// Sample count at which confidence saturates to 1.
    pub k_min: u32,
    /// Unverified-claim share above which the quadratic penalty applies.
    pub unverified_knee: f64,
    /// Smoothing factor for the commitment breach decay.
    pub breach_alpha: f64,
    /// Weight given to awareness markers when blending justice.
    pub awareness_weight: f64,
}

impl Default for InferencerConfig {
    fn default() -> Self {
        Self {
            k_min: 10,
            unverified_knee: 0.3,
            breach_alpha: 0.3,
            awareness_weight: 0.3,
        }
    }
}

// ============================================================================
// SECTION: Readings
// ============================================================================

/// Virtue reading with per-dimension confidences.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtueReading {
    /// Inferred virtue scalars.
    pub values: VirtueValues,
    /// Per-dimension confidences, canonical virtue order.
    pub confidence: [f64; VIRTUE_COUNT],
    /// Per-dimension sample counts, canonical virtue order.
    pub samples: [u32; VIRTUE_COUNT],
}

// ============================================================================
// SECTION: Inferencer
// ============================================================================

/// Derives virtue dimensions from an agent's behavioral log.
#[derive(Debug, Clone, Default)]
pub struct VirtueInferencer {
    /// Inferencer configuration.
    config: InferencerConfig,
}

impl VirtueInferencer {
    /// Creates an inferencer with the given configuration.
    #[must_use]
    pub const fn new(config: InferencerConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the inferencer configuration.
    #[must_use]
    pub const fn config(&self) -> &InferencerConfig {
        &self.config
    }

    /// Infers the seven virtue dimensions from the whole retained log.
    ///
    /// Never fails: absent evidence yields midpoint values with zero
    /// confidence.
    #[must_use]
    pub fn infer(&self, log: &BehaviorLog, _now: Timestamp) -> VirtueReading {
        let mut claims_verified = 0u32;
        let mut claims_total = 0u32;
        let mut commitments_fulfilled = 0u32;
        let mut commitments_total = 0u32;
        let mut breach_decay = 0.0f64;
        let mut breach_seeded = false;
        let mut conflict_sum = 0.0f64;
        let mut collaborations = 0u32;
        let mut benefit_self_sum = 0.0f64;
        let mut benefit_other_sum = 0.0f64;
        let mut fairness_sum = 0.0f64;
        let mut actions = 0u32;
        let mut credit_seeks = 0u32;
        let mut comprehension_total = 0u32;
        let mut aware_depth_sum = 0.0f64;

        for record in log.records() {
            match &record.signal {
                BehaviorSignal::Action(action) => {
                    actions += 1;
                    benefit_self_sum += action.benefit_self;
                    benefit_other_sum += action.benefit_other;
                    fairness_sum += 1.0 - (action.benefit_self - action.benefit_other).abs();
                }
                BehaviorSignal::Claim {
                    verified, ..
                } => {
                    claims_total += 1;
                    if *verified {
                        claims_verified += 1;
                    }
                }
                BehaviorSignal::Commitment {
                    fulfilled, ..
                } => {
                    commitments_total += 1;
                    if *fulfilled {
                        commitments_fulfilled += 1;
                    }
                    let miss = if *fulfilled { 0.0 } else { 1.0 };
                    if breach_seeded {
                        breach_decay = self.config.breach_alpha * miss
                            + (1.0 - self.config.breach_alpha) * breach_decay;
                    } else {
                        breach_decay = miss;
                        breach_seeded = true;
                    }
                }
                BehaviorSignal::Collaboration {
                    conflict, ..
                } => {
                    collaborations += 1;
                    conflict_sum += *conflict;
                }
                BehaviorSignal::CreditSeek => credit_seeks += 1,
                BehaviorSignal::Comprehension {
                    context_aware,
                    depth,
                } => {
                    comprehension_total += 1;
                    if *context_aware {
                        aware_depth_sum += *depth;
                    }
                }
            }
        }

        let truthfulness = self.truthfulness(claims_verified, claims_total);
        let justice = self.justice(fairness_sum, actions, aware_depth_sum, comprehension_total);
        let trustworthiness =
            trustworthiness(commitments_fulfilled, commitments_total, breach_decay);
        let unity = self.unity(conflict_sum, collaborations);
        let service = service(benefit_self_sum, benefit_other_sum, actions);
        let detachment = detachment(credit_seeks, actions);
        let understanding = understanding(aware_depth_sum, comprehension_total);

        let samples = [
            claims_total,
            actions + comprehension_total,
            commitments_total,
            collaborations,
            actions,
            actions + credit_seeks,
            comprehension_total,
        ];
        let mut confidence = [0.0; VIRTUE_COUNT];
        for (slot, count) in confidence.iter_mut().zip(samples) {
            *slot = saturating_confidence(count, self.config.k_min);
        }

        VirtueReading {
            values: VirtueValues {
                truthfulness,
                justice,
                trustworthiness,
                unity,
                service,
                detachment,
                understanding,
            },
            confidence,
            samples,
        }
    }

    /// Verified-claim ratio with the quadratic unverified penalty.
    fn truthfulness(&self, verified: u32, total: u32) -> f64 {
        if total == 0 {
            return 0.5;
        }
        let verified_ratio = f64::from(verified) / f64::from(total);
        let unverified_ratio = 1.0 - verified_ratio;
        if unverified_ratio <= self.config.unverified_knee {
            return clamp_unit(verified_ratio);
        }
        let knee = self.config.unverified_knee;
        let excess = (unverified_ratio - knee) / (1.0 - knee).max(f64::EPSILON);
        clamp_unit(verified_ratio * (1.0 - excess * excess))
    }

    /// Benefit-split fairness blended with awareness markers.
    fn justice(
        &self,
        fairness_sum: f64,
        actions: u32,
        aware_depth_sum: f64,
        comprehension_total: u32,
    ) -> f64 {
        if actions == 0 {
            return 0.5;
        }
        let fairness = fairness_sum / f64::from(actions);
        if comprehension_total == 0 {
            return clamp_unit(fairness);
        }
        let awareness = aware_depth_sum / f64::from(comprehension_total);
        let weight = self.config.awareness_weight;
        clamp_unit(fairness * (1.0 - weight) + awareness * weight)
    }

    /// Inverse mean conflict, weighted by collaboration frequency.
    fn unity(&self, conflict_sum: f64, collaborations: u32) -> f64 {
        if collaborations == 0 {
            return 0.5;
        }
        let harmony = 1.0 - conflict_sum / f64::from(collaborations);
        let weight = saturating_confidence(collaborations, self.config.k_min);
        clamp_unit(harmony * weight + 0.5 * (1.0 - weight))
    }
}

/// Fulfilled-commitment ratio scaled by breach decay.
fn trustworthiness(fulfilled: u32, total: u32, breach_decay: f64) -> f64 {
    if total == 0 {
        return 0.5;
    }
    let fulfilled_ratio = f64::from(fulfilled) / f64::from(total);
    clamp_unit(fulfilled_ratio * (1.0 - clamp_unit(breach_decay)))
}

/// Benefit-to-others share of total benefit.
fn service(benefit_self_sum: f64, benefit_other_sum: f64, actions: u32) -> f64 {
    if actions == 0 {
        return 0.5;
    }
    let total = benefit_self_sum + benefit_other_sum;
    if total <= f64::EPSILON {
        return 0.5;
    }
    clamp_unit(benefit_other_sum / total)
}

/// Inverse credit-seeking ratio.
fn detachment(credit_seeks: u32, actions: u32) -> f64 {
    let denominator = credit_seeks + actions;
    if denominator == 0 {
        return 0.5;
    }
    clamp_unit(1.0 - f64::from(credit_seeks) / f64::from(denominator))
}

/// Context-awareness rate weighted by depth.
fn understanding(aware_depth_sum: f64, comprehension_total: u32) -> f64 {
    if comprehension_total == 0 {
        return 0.5;
    }
    clamp_unit(aware_depth_sum / f64::from(comprehension_total))
}
