// crates/conduct-gate-config/src/lib.rs
// ============================================================================
// Module: Conduct Gate Configuration
// Description: Canonical configuration model, strict loading, and validation.
// Purpose: Provide one validated configuration surface for the whole engine.
// Dependencies: conduct-gate-{core, dynamics, signals, store-sqlite}, serde, toml
// ============================================================================

//! ## Overview
//! All engine tuning flows through [`ConductGateConfig`]: signal windows,
//! manifold overlays and projection bounds, gate policies, store durability,
//! dynamics thresholds, and calibration parameters. Loading is strict and
//! fail-closed (path guards, size cap, UTF-8, full validation); hot reload
//! replaces the whole configuration behind a [`ReloadBarrier`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod reload;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use conduct_gate_core::BackpressurePolicy;
use conduct_gate_core::ConstraintOverlay;
use conduct_gate_core::InterventionPolicy;
use conduct_gate_core::Manifold;
use conduct_gate_core::ManifoldError;
use conduct_gate_core::ProjectionConfig;
use conduct_gate_core::TimeoutPolicy;
use conduct_gate_dynamics::CalibrationConfig;
use conduct_gate_dynamics::DynamicsConfig;
use conduct_gate_signals::SignalsConfig;
use conduct_gate_store_sqlite::FsyncPolicy;
use conduct_gate_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use reload::CallGuard;
pub use reload::ReloadBarrier;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted configuration file size in bytes.
pub const MAX_CONFIG_BYTES: u64 = 1_048_576;

/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4_096;

/// Maximum behavioral log retention accepted (7 days).
const MAX_RETENTION_MS: i64 = 7 * 24 * 60 * 60 * 1_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; messages are safe to
///   surface to operators.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file path failed a guard.
    #[error("config path invalid: {0}")]
    Path(String),
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config contents failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
    /// Manifold overlay composition failed.
    #[error("config manifold error: {0}")]
    Manifold(#[from] ManifoldError),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Manifold and projection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifoldSection {
    /// Constraint overlays to enable, in order.
    pub overlays: Vec<ConstraintOverlay>,
    /// Maximum projection iterations.
    pub projection_max_iterations: usize,
    /// Minimum per-dimension repair step.
    pub projection_min_step: f64,
    /// Maximum per-dimension repair step.
    pub projection_step_cap: f64,
}

impl Default for ManifoldSection {
    fn default() -> Self {
        let projection = ProjectionConfig::default();
        Self {
            overlays: Vec::new(),
            projection_max_iterations: projection.max_iterations,
            projection_min_step: projection.min_step,
            projection_step_cap: projection.step_cap,
        }
    }
}

impl ManifoldSection {
    /// Returns the projection configuration for this section.
    #[must_use]
    pub const fn projection(&self) -> ProjectionConfig {
        ProjectionConfig {
            max_iterations: self.projection_max_iterations,
            min_step: self.projection_min_step,
            step_cap: self.projection_step_cap,
        }
    }

    /// Assembles the manifold with the configured overlays.
    ///
    /// # Errors
    ///
    /// Returns [`ManifoldError`] when an overlay shadows an existing
    /// constraint or offers no repair path.
    pub fn assemble_manifold(&self) -> Result<Manifold, ManifoldError> {
        Manifold::with_overlays(self.overlays.clone())
    }
}

/// Gate policy tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSection {
    /// Per-call wall-clock latency budget in milliseconds.
    pub latency_budget_ms: u64,
    /// Policy when the latency budget expires.
    pub timeout_policy: TimeoutPolicy,
    /// Required acknowledgment before the non-conservative timeout policy is
    /// accepted.
    pub unsafe_allow_timeout_pass: bool,
    /// Policy when the audit write path refuses a write.
    pub backpressure_policy: BackpressurePolicy,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            latency_budget_ms: 100,
            timeout_policy: TimeoutPolicy::default(),
            unsafe_allow_timeout_pass: false,
            backpressure_policy: BackpressurePolicy::default(),
        }
    }
}

/// Store durability and retention tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Durability policy.
    pub fsync: FsyncPolicy,
    /// Writer queue capacity.
    pub writer_queue_capacity: usize,
    /// Rows deleted per GC batch.
    pub gc_batch_size: usize,
    /// Retention horizon for trajectories and events, in milliseconds.
    pub retention_horizon_ms: i64,
    /// GC cadence in milliseconds.
    pub gc_period_ms: i64,
}

impl Default for StoreSection {
    fn default() -> Self {
        let store = SqliteStoreConfig::new("conduct-gate.db");
        Self {
            path: store.path,
            busy_timeout_ms: store.busy_timeout_ms,
            fsync: store.fsync,
            writer_queue_capacity: store.writer_queue_capacity,
            gc_batch_size: store.gc_batch_size,
            retention_horizon_ms: 24 * 60 * 60 * 1_000,
            gc_period_ms: 60_000,
        }
    }
}

impl StoreSection {
    /// Returns the store configuration for this section.
    #[must_use]
    pub fn store(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            fsync: self.fsync,
            writer_queue_capacity: self.writer_queue_capacity,
            gc_batch_size: self.gc_batch_size,
        }
    }
}

/// Dynamics tuning: clustering, classification, and interventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsSection {
    /// Attractor engine tuning.
    pub engine: DynamicsConfig,
    /// Intervention escalation policy.
    pub intervention: InterventionPolicy,
}

impl Default for DynamicsSection {
    fn default() -> Self {
        Self {
            engine: DynamicsConfig::default(),
            intervention: InterventionPolicy::default(),
        }
    }
}

// ============================================================================
// SECTION: Root Configuration
// ============================================================================

/// Process-wide engine configuration.
///
/// # Invariants
/// - A value returned by [`ConductGateConfig::load`] has passed
///   [`ConductGateConfig::validate`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductGateConfig {
    /// Signal measurement tuning.
    pub signals: SignalsConfig,
    /// Manifold and projection tuning.
    pub manifold: ManifoldSection,
    /// Gate policy tuning.
    pub gate: GateSection,
    /// Store durability and retention tuning.
    pub store: StoreSection,
    /// Dynamics tuning.
    pub dynamics: DynamicsSection,
    /// Calibration monitor tuning.
    pub calibration: CalibrationConfig,
}

impl ConductGateConfig {
    /// Loads configuration from a TOML file, or defaults when `path` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a path guard fails, the file cannot be
    /// read or parsed, or validation rejects the contents.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        validate_config_path(path)?;
        let metadata =
            std::fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::Path("config file exceeds size limit".to_string()));
        }
        let bytes = std::fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ConfigError::Path("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every cross-field invariant.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated invariant,
    /// or [`ConfigError::Manifold`] when overlay composition fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_signals()?;
        self.validate_manifold()?;
        self.validate_gate()?;
        self.validate_store()?;
        self.validate_dynamics()?;
        self.validate_calibration()?;
        Ok(())
    }

    /// Validates the signals section.
    fn validate_signals(&self) -> Result<(), ConfigError> {
        let signals = &self.signals;
        if signals.retention_ms <= 0 || signals.retention_ms > MAX_RETENTION_MS {
            return Err(ConfigError::Invalid(format!(
                "signals.retention_ms must be in (0, {MAX_RETENTION_MS}]"
            )));
        }
        if signals.staleness_ms <= 0 {
            return Err(ConfigError::Invalid(
                "signals.staleness_ms must be positive".to_string(),
            ));
        }
        if signals.meter.window_ms <= 0 {
            return Err(ConfigError::Invalid(
                "signals.meter.window_ms must be positive".to_string(),
            ));
        }
        if signals.meter.activity_ceiling <= 0.0 {
            return Err(ConfigError::Invalid(
                "signals.meter.activity_ceiling must be positive".to_string(),
            ));
        }
        if signals.meter.ema_alpha <= 0.0 || signals.meter.ema_alpha > 1.0 {
            return Err(ConfigError::Invalid(
                "signals.meter.ema_alpha must be in (0, 1]".to_string(),
            ));
        }
        if signals.meter.k_min == 0 {
            return Err(ConfigError::Invalid(
                "signals.meter.k_min must be at least 1".to_string(),
            ));
        }
        if signals.inferencer.k_min == 0 {
            return Err(ConfigError::Invalid(
                "signals.inferencer.k_min must be at least 1".to_string(),
            ));
        }
        if !(0.0 .. 1.0).contains(&signals.inferencer.unverified_knee) {
            return Err(ConfigError::Invalid(
                "signals.inferencer.unverified_knee must be in [0, 1)".to_string(),
            ));
        }
        if signals.inferencer.breach_alpha <= 0.0 || signals.inferencer.breach_alpha > 1.0 {
            return Err(ConfigError::Invalid(
                "signals.inferencer.breach_alpha must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0 ..= 1.0).contains(&signals.inferencer.awareness_weight) {
            return Err(ConfigError::Invalid(
                "signals.inferencer.awareness_weight must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the manifold section, including overlay composition.
    fn validate_manifold(&self) -> Result<(), ConfigError> {
        if self.manifold.projection_max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "manifold.projection_max_iterations must be at least 1".to_string(),
            ));
        }
        if self.manifold.projection_min_step <= 0.0 {
            return Err(ConfigError::Invalid(
                "manifold.projection_min_step must be positive".to_string(),
            ));
        }
        if self.manifold.projection_step_cap < self.manifold.projection_min_step
            || self.manifold.projection_step_cap > 1.0
        {
            return Err(ConfigError::Invalid(
                "manifold.projection_step_cap must be in [min_step, 1]".to_string(),
            ));
        }
        // Startup check: overlays may only add constraints.
        self.manifold.assemble_manifold()?;
        Ok(())
    }

    /// Validates the gate section.
    fn validate_gate(&self) -> Result<(), ConfigError> {
        if self.gate.latency_budget_ms == 0 {
            return Err(ConfigError::Invalid(
                "gate.latency_budget_ms must be at least 1".to_string(),
            ));
        }
        if self.gate.timeout_policy == TimeoutPolicy::AllowUncorrected
            && !self.gate.unsafe_allow_timeout_pass
        {
            return Err(ConfigError::Invalid(
                "gate.timeout_policy allow_uncorrected requires unsafe_allow_timeout_pass"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the store section.
    fn validate_store(&self) -> Result<(), ConfigError> {
        if self.store.writer_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "store.writer_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.store.gc_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "store.gc_batch_size must be at least 1".to_string(),
            ));
        }
        if self.store.retention_horizon_ms <= 0 {
            return Err(ConfigError::Invalid(
                "store.retention_horizon_ms must be positive".to_string(),
            ));
        }
        if self.store.gc_period_ms <= 0 {
            return Err(ConfigError::Invalid(
                "store.gc_period_ms must be positive".to_string(),
            ));
        }
        if let FsyncPolicy::EveryN {
            n,
        } = self.store.fsync
            && n == 0
        {
            return Err(ConfigError::Invalid(
                "store.fsync every_n requires n greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the dynamics section.
    fn validate_dynamics(&self) -> Result<(), ConfigError> {
        let engine = &self.dynamics.engine;
        if engine.clustering.epsilon <= 0.0 {
            return Err(ConfigError::Invalid(
                "dynamics.engine.clustering.epsilon must be positive".to_string(),
            ));
        }
        if engine.clustering.min_samples == 0 {
            return Err(ConfigError::Invalid(
                "dynamics.engine.clustering.min_samples must be at least 1".to_string(),
            ));
        }
        if engine.clustering.window_size < 2 {
            return Err(ConfigError::Invalid(
                "dynamics.engine.clustering.window_size must be at least 2".to_string(),
            ));
        }
        if engine.recompute_period_ms <= 0 {
            return Err(ConfigError::Invalid(
                "dynamics.engine.recompute_period_ms must be positive".to_string(),
            ));
        }
        if engine.feedback_retention == 0 {
            return Err(ConfigError::Invalid(
                "dynamics.engine.feedback_retention must be at least 1".to_string(),
            ));
        }
        let classifier = &engine.classifier;
        if classifier.tau_low >= classifier.tau_eff {
            return Err(ConfigError::Invalid(
                "dynamics classifier requires tau_low < tau_eff".to_string(),
            ));
        }
        if classifier.tau_fb <= 0.0 || classifier.tau_fb > 1.0 {
            return Err(ConfigError::Invalid(
                "dynamics classifier tau_fb must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0 ..= 1.0).contains(&classifier.tau_cost) {
            return Err(ConfigError::Invalid(
                "dynamics classifier tau_cost must be in [0, 1]".to_string(),
            ));
        }
        let intervention = &self.dynamics.intervention;
        if intervention.supervise_tenure_ms >= intervention.restrict_tenure_ms
            || intervention.restrict_tenure_ms >= intervention.block_tenure_ms
        {
            return Err(ConfigError::Invalid(
                "dynamics intervention tenures must be strictly increasing".to_string(),
            ));
        }
        if intervention.throttle_rate_factor <= 0.0 || intervention.throttle_rate_factor > 1.0 {
            return Err(ConfigError::Invalid(
                "dynamics intervention throttle_rate_factor must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the calibration section.
    fn validate_calibration(&self) -> Result<(), ConfigError> {
        let calibration = &self.calibration;
        if !(-1.0 ..= 1.0).contains(&calibration.rho_min) {
            return Err(ConfigError::Invalid(
                "calibration.rho_min must be in [-1, 1]".to_string(),
            ));
        }
        if calibration.sample_floor < 2 {
            return Err(ConfigError::Invalid(
                "calibration.sample_floor must be at least 2".to_string(),
            ));
        }
        if calibration.drift_window < calibration.sample_floor {
            return Err(ConfigError::Invalid(
                "calibration.drift_window must be at least sample_floor".to_string(),
            ));
        }
        if calibration.advisory_cooldown == 0 {
            return Err(ConfigError::Invalid(
                "calibration.advisory_cooldown must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Path Guards
// ============================================================================

/// Validates the configuration file path.
fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    let rendered = path.to_string_lossy();
    if rendered.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Path("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Path("config path component too long".to_string()));
        }
    }
    Ok(())
}
