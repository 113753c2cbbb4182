// crates/conduct-gate-signals/src/lib.rs
// ============================================================================
// Module: Conduct Gate Signals Library
// Description: Behavioral log, operational meter, and virtue inferencer.
// Purpose: Measure composite phase-space states from behavioral evidence.
// Dependencies: conduct-gate-core
// ============================================================================

//! ## Overview
//! The signals layer turns behavioral evidence into the composite states the
//! admission gate evaluates. It owns one sliding-window log per agent, folds
//! action events into operational dimensions, infers virtue dimensions from
//! multi-signal evidence, and serves fresh composites within a configurable
//! staleness bound.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod composer;
pub mod inferencer;
pub mod log;
pub mod meter;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use composer::CompositeComposer;
pub use composer::DEFAULT_STALENESS_MS;
pub use composer::SignalsConfig;
pub use inferencer::InferencerConfig;
pub use inferencer::VirtueInferencer;
pub use inferencer::VirtueReading;
pub use log::BehaviorLog;
pub use log::DEFAULT_RETENTION_MS;
pub use meter::MeterConfig;
pub use meter::MeterError;
pub use meter::OperationalMeter;
pub use meter::OperationalReading;
pub use meter::saturating_confidence;
