// crates/conduct-gate-core/src/core/mod.rs
// ============================================================================
// Module: Conduct Gate Core Types
// Description: Canonical state, signal, constraint, and audit structures.
// Purpose: Provide stable, serializable types for the admission engine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Conduct Gate core types define the phase-space state model, behavioral
//! signals, declarative constraints, audit records, and attractor snapshots.
//! These types are the canonical source of truth for any derived surfaces.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod attractor;
pub mod audit;
pub mod constraint;
pub mod hashing;
pub mod identifiers;
pub mod outcome;
pub mod signal;
pub mod state;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use attractor::Attractor;
pub use attractor::AttractorClassification;
pub use attractor::AttractorSnapshot;
pub use attractor::SNAPSHOT_FORMAT_VERSION;
pub use audit::GateOutcome;
pub use audit::GateReason;
pub use audit::GateResult;
pub use audit::Intervention;
pub use audit::InterventionKind;
pub use audit::SecurityEvent;
pub use audit::TrajectoryEntry;
pub use audit::TransitionKind;
pub use audit::ViolationList;
pub use audit::ViolationRecord;
pub use constraint::Constraint;
pub use constraint::Predicate;
pub use constraint::RepairDirection;
pub use constraint::RepairHint;
pub use constraint::Severity;
pub use hashing::AuditDigest;
pub use hashing::AuditSeal;
pub use hashing::DigestAlgorithm;
pub use hashing::IntegrityError;
pub use identifiers::ActionRef;
pub use identifiers::AgentId;
pub use identifiers::AttractorId;
pub use identifiers::ConstraintId;
pub use identifiers::CorrelationId;
pub use identifiers::EventId;
pub use outcome::OutcomeFeedback;
pub use signal::ActionEvent;
pub use signal::ActionOutcome;
pub use signal::BehaviorSignal;
pub use signal::SignalRecord;
pub use state::DIMENSION_COUNT;
pub use state::Dimension;
pub use state::OPERATIONAL_COUNT;
pub use state::OperationalDim;
pub use state::OperationalValues;
pub use state::PhaseState;
pub use state::VIRTUE_COUNT;
pub use state::VirtueDim;
pub use state::VirtueValues;
pub use state::clamp_signed_unit;
pub use state::clamp_unit;
pub use time::Timestamp;
