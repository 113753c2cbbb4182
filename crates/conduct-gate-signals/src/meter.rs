// crates/conduct-gate-signals/src/meter.rs
// ============================================================================
// Module: Operational Meter
// Description: Derive the five operational dimensions from action events.
// Purpose: Produce windowed, smoothed operational readings with confidences.
// Dependencies: conduct-gate-core, crate::log
// ============================================================================

//! ## Overview
//! The operational meter folds the recent action event stream into five
//! scalars: activity (windowed rate), coordination (peer-referencing EMA),
//! effectiveness (success EMA with a neutral prior for missing outcomes),
//! resource (cost EMA), and health (inverse error EMA). Each dimension
//! carries a confidence that saturates with sample count. The meter fails
//! only when the window holds no action events at all.

// ============================================================================
// SECTION: Imports
// ============================================================================

use conduct_gate_core::ActionOutcome;
use conduct_gate_core::BehaviorSignal;
use conduct_gate_core::OPERATIONAL_COUNT;
use conduct_gate_core::OperationalValues;
use conduct_gate_core::Timestamp;
use conduct_gate_core::clamp_unit;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::log::BehaviorLog;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Operational meter tuning parameters.
///
/// # Invariants
/// - `window_ms` and `activity_ceiling` are positive.
/// - `ema_alpha` is in (0, 1].
/// - `k_min` is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Measurement window in milliseconds.
    pub window_ms: i64,
    /// Action count per window at which activity saturates to 1.
    pub activity_ceiling: f64,
    /// Smoothing factor for EMA dimensions.
    pub ema_alpha: f64,
    /// Sample count at which confidence saturates to 1.
    pub k_min: u32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            activity_ceiling: 60.0,
            ema_alpha: 0.2,
            k_min: 10,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Operational meter errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeterError {
    /// No action events fell inside the measurement window.
    #[error("insufficient signal: no action events in window")]
    InsufficientSignal,
}

// ============================================================================
// SECTION: Readings
// ============================================================================

/// Operational reading with per-dimension confidences.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationalReading {
    /// Measured operational scalars.
    pub values: OperationalValues,
    /// Per-dimension confidences, canonical operational order.
    pub confidence: [f64; OPERATIONAL_COUNT],
    /// Per-dimension sample counts, canonical operational order.
    pub samples: [u32; OPERATIONAL_COUNT],
}

// ============================================================================
// SECTION: Meter
// ============================================================================

/// Derives operational dimensions from an agent's behavioral log.
#[derive(Debug, Clone, Default)]
pub struct OperationalMeter {
    /// Meter configuration.
    config: MeterConfig,
}

impl OperationalMeter {
    /// Creates a meter with the given configuration.
    #[must_use]
    pub const fn new(config: MeterConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the meter configuration.
    #[must_use]
    pub const fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Measures the five operational dimensions at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MeterError::InsufficientSignal`] when the window contains no
    /// action events; any partial signal produces a reading instead.
    pub fn measure(
        &self,
        log: &BehaviorLog,
        now: Timestamp,
    ) -> Result<OperationalReading, MeterError> {
        let since = now.saturating_sub_millis(self.config.window_ms.max(1));
        let mut action_count = 0u32;
        let mut outcome_samples = 0u32;
        let mut coordination = Ema::new(self.config.ema_alpha);
        let mut effectiveness = Ema::new(self.config.ema_alpha);
        let mut resource = Ema::new(self.config.ema_alpha);
        let mut error_rate = Ema::new(self.config.ema_alpha);

        for record in log.records_since(since) {
            let BehaviorSignal::Action(action) = &record.signal else {
                continue;
            };
            action_count += 1;
            coordination.fold(if action.peers.is_empty() { 0.0 } else { 1.0 });
            match action.outcome {
                Some(ActionOutcome::Success) => {
                    outcome_samples += 1;
                    effectiveness.fold(1.0);
                }
                Some(ActionOutcome::Failure) => {
                    outcome_samples += 1;
                    effectiveness.fold(0.0);
                }
                // Missing outcome data decays the estimate toward the
                // neutral prior.
                None => effectiveness.fold(0.5),
            }
            resource.fold(action.cost);
            error_rate.fold(if action.error { 1.0 } else { 0.0 });
        }

        if action_count == 0 {
            return Err(MeterError::InsufficientSignal);
        }

        let activity = clamp_unit(f64::from(action_count) / self.config.activity_ceiling.max(1.0));
        let values = OperationalValues {
            activity,
            coordination: coordination.value(),
            effectiveness: effectiveness.value(),
            resource: resource.value(),
            health: clamp_unit(1.0 - error_rate.value()),
        };
        let samples = [action_count, action_count, outcome_samples, action_count, action_count];
        let mut confidence = [0.0; OPERATIONAL_COUNT];
        for (slot, count) in confidence.iter_mut().zip(samples) {
            *slot = saturating_confidence(count, self.config.k_min);
        }
        Ok(OperationalReading {
            values,
            confidence,
            samples,
        })
    }
}

/// Returns `min(1, samples / k_min)`.
#[must_use]
pub fn saturating_confidence(samples: u32, k_min: u32) -> f64 {
    clamp_unit(f64::from(samples) / f64::from(k_min.max(1)))
}

// ============================================================================
// SECTION: EMA
// ============================================================================

/// Exponential moving average seeded at the neutral midpoint.
#[derive(Debug, Clone, Copy)]
struct Ema {
    /// Smoothing factor in (0, 1].
    alpha: f64,
    /// Current estimate.
    estimate: f64,
    /// Whether any sample has been folded.
    seeded: bool,
}

impl Ema {
    /// Creates an EMA with the given smoothing factor.
    const fn new(alpha: f64) -> Self {
        Self {
            alpha,
            estimate: 0.5,
            seeded: false,
        }
    }

    /// Folds one clamped sample into the estimate.
    fn fold(&mut self, sample: f64) {
        let sample = clamp_unit(sample);
        if self.seeded {
            self.estimate = self.alpha * sample + (1.0 - self.alpha) * self.estimate;
        } else {
            self.estimate = sample;
            self.seeded = true;
        }
    }

    /// Returns the clamped current estimate.
    fn value(self) -> f64 {
        clamp_unit(self.estimate)
    }
}
