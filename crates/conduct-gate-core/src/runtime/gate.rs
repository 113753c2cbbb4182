// crates/conduct-gate-core/src/runtime/gate.rs
// ============================================================================
// Module: Conduct Gate Admission Gate
// Description: Measure, validate, project, decide, and audit every action.
// Purpose: Provide the single canonical admission path for agent actions.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The action gate is the only admission path: it composes a fresh state,
//! evaluates the manifold, projects invalid states under the remaining
//! latency budget, writes the trajectory entry and any security event, and
//! finally attaches a background intervention. The gate never raises to its
//! caller; every failure below it collapses into a blocked result with an
//! audit record.
//!
//! Manifold replacement is a whole-value swap behind a read/write lock: the
//! write acquisition drains in-flight gate calls, so no call ever observes a
//! partially replaced constraint set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::core::ActionRef;
use crate::core::AgentId;
use crate::core::ConstraintId;
use crate::core::CorrelationId;
use crate::core::EventId;
use crate::core::GateOutcome;
use crate::core::GateReason;
use crate::core::GateResult;
use crate::core::Intervention;
use crate::core::PhaseState;
use crate::core::SecurityEvent;
use crate::core::Timestamp;
use crate::core::TrajectoryEntry;
use crate::core::TransitionKind;
use crate::core::ViolationList;
use crate::interfaces::ComposeError;
use crate::interfaces::InterventionAdvisor;
use crate::interfaces::StateComposer;
use crate::interfaces::TrajectoryStore;
use crate::interfaces::TrajectoryStoreError;
use crate::runtime::manifold::Manifold;
use crate::runtime::projection::Deadline;
use crate::runtime::projection::Projection;
use crate::runtime::projection::ProjectionConfig;
use crate::runtime::projection::project;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default per-call latency budget in milliseconds.
pub const DEFAULT_LATENCY_BUDGET_MS: u64 = 100;

/// Capacity of the secondary security-event spill ring.
pub const SPILL_CAPACITY: usize = 256;

/// Policy applied when the latency budget expires mid-call.
///
/// # Invariants
/// - `Block` is the conservative default; `AllowUncorrected` admits the
///   unrepaired state and must be enabled explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Block the action on timeout.
    #[default]
    Block,
    /// Admit the uncorrected state, recording the timeout in the audit log.
    AllowUncorrected,
}

/// Policy applied when the trajectory write queue refuses a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Block the action, preserving a complete audit trail.
    #[default]
    BlockAction,
    /// Admit the action and count the missed audit write.
    ShedAudit,
}

/// Gate tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionGateConfig {
    /// Per-call wall-clock latency budget in milliseconds.
    pub latency_budget_ms: u64,
    /// Policy when the budget expires.
    pub timeout_policy: TimeoutPolicy,
    /// Policy when the audit write path refuses a write.
    pub backpressure_policy: BackpressurePolicy,
    /// Projection tuning.
    pub projection: ProjectionConfig,
}

impl Default for ActionGateConfig {
    fn default() -> Self {
        Self {
            latency_budget_ms: DEFAULT_LATENCY_BUDGET_MS,
            timeout_policy: TimeoutPolicy::default(),
            backpressure_policy: BackpressurePolicy::default(),
            projection: ProjectionConfig::default(),
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Impact class declared for a candidate action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactClass {
    /// Low-impact action.
    Low,
    /// Standard action.
    #[default]
    Standard,
    /// High-impact action subject to supervision interventions.
    High,
}

/// Opaque descriptor of a candidate action.
///
/// # Invariants
/// - The gate never interprets `kind` or `target` beyond audit recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action kind tag.
    pub kind: String,
    /// Optional action target.
    pub target: Option<String>,
    /// Declared impact class.
    pub impact: ImpactClass,
}

/// A single admission request.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRequest {
    /// Agent requesting admission.
    pub agent_id: AgentId,
    /// Reference identifying the candidate action.
    pub action_ref: ActionRef,
    /// Candidate action descriptor.
    pub action: ActionDescriptor,
    /// Call timestamp supplied by the host.
    pub now: Timestamp,
    /// Optional per-call latency budget override in milliseconds.
    pub latency_budget_ms: Option<u64>,
    /// Optional correlation identifier.
    pub correlation_id: Option<CorrelationId>,
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Per-agent admission counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetricSummary {
    /// Agent the summary describes.
    pub agent_id: AgentId,
    /// Total gate calls.
    pub calls: u64,
    /// Clean admissions.
    pub allowed: u64,
    /// Admissions with correction.
    pub corrected: u64,
    /// Blocked calls.
    pub blocked: u64,
    /// Calls that hit the latency budget.
    pub timeouts: u64,
    /// Calls composed from insufficient signal.
    pub low_confidence_calls: u64,
    /// Outcome of the most recent call.
    pub last_outcome: GateOutcome,
    /// Timestamp of the most recent call.
    pub last_timestamp: Timestamp,
}

// ============================================================================
// SECTION: Action Gate
// ============================================================================

/// Admission gate generic over composition, storage, and advice interfaces.
pub struct ActionGate<C, S, A> {
    /// Active manifold; replaced wholesale behind the lock.
    manifold: RwLock<Arc<Manifold>>,
    /// State composer implementation.
    composer: C,
    /// Trajectory store implementation.
    store: S,
    /// Intervention advisor implementation.
    advisor: A,
    /// Gate configuration.
    config: ActionGateConfig,
    /// Per-agent admission counters.
    metrics: Mutex<BTreeMap<AgentId, AgentMetricSummary>>,
    /// Count of audit records lost: writes shed by policy or events evicted
    /// from the full spill ring.
    audit_misses: AtomicU64,
    /// Count of advisor failures swallowed by the gate.
    advisor_failures: AtomicU64,
    /// Secondary bounded spill ring for security events the store refused.
    spill: Mutex<VecDeque<SecurityEvent>>,
}

impl<C, S, A> ActionGate<C, S, A>
where
    C: StateComposer,
    S: TrajectoryStore,
    A: InterventionAdvisor,
{
    /// Creates a new action gate.
    #[must_use]
    pub fn new(
        manifold: Arc<Manifold>,
        composer: C,
        store: S,
        advisor: A,
        config: ActionGateConfig,
    ) -> Self {
        Self {
            manifold: RwLock::new(manifold),
            composer,
            store,
            advisor,
            config,
            metrics: Mutex::new(BTreeMap::new()),
            audit_misses: AtomicU64::new(0),
            advisor_failures: AtomicU64::new(0),
            spill: Mutex::new(VecDeque::with_capacity(SPILL_CAPACITY)),
        }
    }

    /// Admits, corrects, or blocks a candidate action.
    ///
    /// This method never panics and never returns an error: every failure
    /// below the gate collapses into a blocked result with an audit record.
    pub fn gate(&self, request: &GateRequest) -> GateResult {
        let budget_ms = request.latency_budget_ms.unwrap_or(self.config.latency_budget_ms);
        let deadline = Deadline::after(Duration::from_millis(budget_ms));
        let manifold = self.current_manifold();

        let composed = match self.composer.compose(&request.agent_id, request.now) {
            Ok(composed) => composed,
            Err(error) => return self.finish_internal_failure(request, &error),
        };
        let state = composed.state;
        let low_confidence = composed.insufficient;

        let report = manifold.evaluate(&state);
        if report.is_valid() {
            return self.finish_clean(request, state, low_confidence);
        }

        let violations = report.violations;
        if deadline.expired() {
            return self.finish_timeout(request, state, violations, low_confidence);
        }

        match project(&manifold, &state, &self.config.projection, &deadline) {
            // Defensive: evaluate said invalid, so projection cannot report
            // the input unchanged; treat it as clean admission if it does.
            Projection::Unchanged(unchanged) => {
                self.finish_clean(request, unchanged, low_confidence)
            }
            Projection::Repaired {
                state: projected, ..
            } => self.finish_corrected(request, state, projected, violations, low_confidence),
            Projection::Failed {
                residuals, ..
            } => self.finish_violation(request, state, violations, residuals, low_confidence),
            Projection::TimedOut {
                ..
            } => self.finish_timeout(request, state, violations, low_confidence),
        }
    }

    /// Replaces the active manifold, draining in-flight gate calls first.
    pub fn replace_manifold(&self, next: Arc<Manifold>) {
        let mut guard = self.manifold.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// Returns the active manifold.
    #[must_use]
    pub fn current_manifold(&self) -> Arc<Manifold> {
        Arc::clone(&self.manifold.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the metric summary for an agent, if any calls were recorded.
    #[must_use]
    pub fn metric_summary(&self, agent_id: &AgentId) -> Option<AgentMetricSummary> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).get(agent_id).cloned()
    }

    /// Returns metric summaries for all agents seen by this gate.
    #[must_use]
    pub fn all_metric_summaries(&self) -> Vec<AgentMetricSummary> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    /// Returns the number of audit records lost by this gate.
    ///
    /// Counts writes shed under the back-pressure policy and events evicted
    /// from the full spill ring; a successful spill is not a miss.
    #[must_use]
    pub fn audit_misses(&self) -> u64 {
        self.audit_misses.load(Ordering::Relaxed)
    }

    /// Returns the number of advisor failures swallowed by this gate.
    #[must_use]
    pub fn advisor_failures(&self) -> u64 {
        self.advisor_failures.load(Ordering::Relaxed)
    }

    /// Returns the security events parked on the secondary spill ring.
    #[must_use]
    pub fn spilled_events(&self) -> Vec<SecurityEvent> {
        self.spill.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    /// Completes a clean admission.
    fn finish_clean(
        &self,
        request: &GateRequest,
        state: PhaseState,
        low_confidence: bool,
    ) -> GateResult {
        let entry = self.entry(request, &state, TransitionKind::Steady, GateOutcome::Allowed, &[]);
        if let Err(error) = self.store.append_entry(&entry) {
            if let Some(result) = self.apply_backpressure(
                request,
                &state,
                ViolationList::new(),
                low_confidence,
                &error,
            ) {
                return result;
            }
        }
        let intervention = self.advise(request, &state, 0);
        self.record_metrics(request, GateOutcome::Allowed, false, low_confidence);
        GateResult {
            outcome: GateOutcome::Allowed,
            reason: GateReason::Valid,
            state: Some(state),
            projected_state: None,
            violations: ViolationList::new(),
            residual_violations: ViolationList::new(),
            security_event_id: None,
            intervention,
        }
    }

    /// Completes an admission with correction.
    fn finish_corrected(
        &self,
        request: &GateRequest,
        original: PhaseState,
        projected: PhaseState,
        violations: ViolationList,
        low_confidence: bool,
    ) -> GateResult {
        let constraint_ids = violations.iter().map(|v| v.constraint_id.clone()).collect::<Vec<_>>();
        let entry = self.entry(
            request,
            &projected,
            TransitionKind::Corrected,
            GateOutcome::AllowedWithCorrection,
            &constraint_ids,
        );
        if let Err(error) = self.store.append_entry(&entry) {
            if let Some(result) =
                self.apply_backpressure(request, &original, violations.clone(), low_confidence, &error)
            {
                return result;
            }
        }
        let event = SecurityEvent {
            agent_id: request.agent_id.clone(),
            timestamp: request.now,
            original_state: Some(original),
            projected_state: Some(projected.clone()),
            violations: violations.clone(),
            residual_violations: ViolationList::new(),
            allowed: true,
            reason: GateReason::Corrected,
            timed_out: false,
            fatal: false,
            low_confidence,
            detail: None,
            correlation_id: request.correlation_id.clone(),
        };
        let original_state = event.original_state.clone();
        let security_event_id = self.emit_event(event);
        let intervention = self.advise(request, &projected, 0);
        self.record_metrics(request, GateOutcome::AllowedWithCorrection, false, low_confidence);
        GateResult {
            outcome: GateOutcome::AllowedWithCorrection,
            reason: GateReason::Corrected,
            state: original_state,
            projected_state: Some(projected),
            violations,
            residual_violations: ViolationList::new(),
            security_event_id,
            intervention,
        }
    }

    /// Completes a blocked call with residual violations.
    fn finish_violation(
        &self,
        request: &GateRequest,
        state: PhaseState,
        violations: ViolationList,
        residuals: ViolationList,
        low_confidence: bool,
    ) -> GateResult {
        let constraint_ids = violations.iter().map(|v| v.constraint_id.clone()).collect::<Vec<_>>();
        let entry = self.entry(
            request,
            &state,
            TransitionKind::Rejected,
            GateOutcome::Blocked,
            &constraint_ids,
        );
        if let Err(error) = self.store.append_entry(&entry) {
            if let Some(result) =
                self.apply_backpressure(request, &state, violations.clone(), low_confidence, &error)
            {
                return result;
            }
        }
        let event = SecurityEvent {
            agent_id: request.agent_id.clone(),
            timestamp: request.now,
            original_state: Some(state.clone()),
            projected_state: None,
            violations: violations.clone(),
            residual_violations: residuals.clone(),
            allowed: false,
            reason: GateReason::ConstraintViolation,
            timed_out: false,
            fatal: false,
            low_confidence,
            detail: None,
            correlation_id: request.correlation_id.clone(),
        };
        let security_event_id = self.emit_event(event);
        let intervention = self.advise(request, &state, residuals.len());
        self.record_metrics(request, GateOutcome::Blocked, false, low_confidence);
        GateResult {
            outcome: GateOutcome::Blocked,
            reason: GateReason::ConstraintViolation,
            state: Some(state),
            projected_state: None,
            violations,
            residual_violations: residuals,
            security_event_id,
            intervention,
        }
    }

    /// Completes a call whose latency budget expired.
    fn finish_timeout(
        &self,
        request: &GateRequest,
        state: PhaseState,
        violations: ViolationList,
        low_confidence: bool,
    ) -> GateResult {
        let (outcome, transition) = match self.config.timeout_policy {
            TimeoutPolicy::Block => (GateOutcome::Blocked, TransitionKind::Rejected),
            TimeoutPolicy::AllowUncorrected => (GateOutcome::Allowed, TransitionKind::Steady),
        };
        let constraint_ids = violations.iter().map(|v| v.constraint_id.clone()).collect::<Vec<_>>();
        let entry = self.entry(request, &state, transition, outcome, &constraint_ids);
        if let Err(error) = self.store.append_entry(&entry) {
            if let Some(result) =
                self.apply_backpressure(request, &state, violations.clone(), low_confidence, &error)
            {
                return result;
            }
        }
        let event = SecurityEvent {
            agent_id: request.agent_id.clone(),
            timestamp: request.now,
            original_state: Some(state.clone()),
            projected_state: None,
            violations: violations.clone(),
            residual_violations: ViolationList::new(),
            allowed: outcome != GateOutcome::Blocked,
            reason: GateReason::Timeout,
            timed_out: true,
            fatal: false,
            low_confidence,
            detail: None,
            correlation_id: request.correlation_id.clone(),
        };
        let security_event_id = self.emit_event(event);
        let intervention = self.advise(request, &state, 0);
        self.record_metrics(request, outcome, true, low_confidence);
        GateResult {
            outcome,
            reason: GateReason::Timeout,
            state: Some(state),
            projected_state: None,
            violations,
            residual_violations: ViolationList::new(),
            security_event_id,
            intervention,
        }
    }

    /// Collapses a composer failure into a blocked internal result.
    fn finish_internal_failure(&self, request: &GateRequest, error: &ComposeError) -> GateResult {
        let event = SecurityEvent {
            agent_id: request.agent_id.clone(),
            timestamp: request.now,
            original_state: None,
            projected_state: None,
            violations: ViolationList::new(),
            residual_violations: ViolationList::new(),
            allowed: false,
            reason: GateReason::Internal,
            timed_out: false,
            fatal: true,
            low_confidence: false,
            detail: Some(error.to_string()),
            correlation_id: request.correlation_id.clone(),
        };
        let security_event_id = self.emit_event(event);
        self.record_metrics(request, GateOutcome::Blocked, false, false);
        GateResult {
            outcome: GateOutcome::Blocked,
            reason: GateReason::Internal,
            state: None,
            projected_state: None,
            violations: ViolationList::new(),
            residual_violations: ViolationList::new(),
            security_event_id,
            intervention: None,
        }
    }

    /// Applies the back-pressure policy to a refused trajectory write.
    ///
    /// Returns `Some(result)` when the call must be blocked; `None` when the
    /// policy sheds the audit write and the call proceeds.
    fn apply_backpressure(
        &self,
        request: &GateRequest,
        state: &PhaseState,
        violations: ViolationList,
        low_confidence: bool,
        error: &TrajectoryStoreError,
    ) -> Option<GateResult> {
        match self.config.backpressure_policy {
            BackpressurePolicy::ShedAudit => {
                self.audit_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            BackpressurePolicy::BlockAction => {
                let event = SecurityEvent {
                    agent_id: request.agent_id.clone(),
                    timestamp: request.now,
                    original_state: Some(state.clone()),
                    projected_state: None,
                    violations,
                    residual_violations: ViolationList::new(),
                    allowed: false,
                    reason: GateReason::StorageUnavailable,
                    timed_out: false,
                    fatal: !matches!(error, TrajectoryStoreError::Overloaded { .. }),
                    low_confidence,
                    detail: Some(error.to_string()),
                    correlation_id: request.correlation_id.clone(),
                };
                // The primary sink just refused a write; park the event on
                // the secondary ring instead of retrying it.
                self.spill_event(event);
                self.record_metrics(request, GateOutcome::Blocked, false, low_confidence);
                Some(GateResult {
                    outcome: GateOutcome::Blocked,
                    reason: GateReason::StorageUnavailable,
                    state: Some(state.clone()),
                    projected_state: None,
                    violations: ViolationList::new(),
                    residual_violations: ViolationList::new(),
                    security_event_id: None,
                    intervention: None,
                })
            }
        }
    }

    /// Builds a trajectory entry for the call.
    fn entry(
        &self,
        request: &GateRequest,
        state: &PhaseState,
        transition: TransitionKind,
        outcome: GateOutcome,
        violations: &[ConstraintId],
    ) -> TrajectoryEntry {
        TrajectoryEntry {
            agent_id: request.agent_id.clone(),
            timestamp: request.now,
            state: state.clone(),
            transition,
            action_ref: request.action_ref.clone(),
            outcome,
            violations: violations.to_vec(),
        }
    }

    /// Appends a security event, spilling to the secondary ring on failure.
    fn emit_event(&self, event: SecurityEvent) -> Option<EventId> {
        match self.store.append_security_event(&event) {
            Ok(event_id) => Some(event_id),
            Err(_) => {
                self.spill_event(event);
                None
            }
        }
    }

    /// Parks a security event on the bounded spill ring.
    ///
    /// A successful spill preserves the event on the secondary path and is
    /// not an audit miss; only evicting an older event to make room loses a
    /// record and counts toward the miss counter.
    fn spill_event(&self, event: SecurityEvent) {
        let mut spill = self.spill.lock().unwrap_or_else(PoisonError::into_inner);
        if spill.len() == SPILL_CAPACITY {
            spill.pop_front();
            self.audit_misses.fetch_add(1, Ordering::Relaxed);
        }
        spill.push_back(event);
    }

    /// Consults the advisor, swallowing and counting failures.
    fn advise(
        &self,
        request: &GateRequest,
        state: &PhaseState,
        residual_violations: usize,
    ) -> Option<Intervention> {
        match self.advisor.advise(&request.agent_id, state, residual_violations, request.now) {
            Ok(intervention) => intervention,
            Err(_) => {
                self.advisor_failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Updates per-agent admission counters.
    fn record_metrics(
        &self,
        request: &GateRequest,
        outcome: GateOutcome,
        timed_out: bool,
        low_confidence: bool,
    ) {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        let summary =
            metrics.entry(request.agent_id.clone()).or_insert_with(|| AgentMetricSummary {
                agent_id: request.agent_id.clone(),
                calls: 0,
                allowed: 0,
                corrected: 0,
                blocked: 0,
                timeouts: 0,
                low_confidence_calls: 0,
                last_outcome: outcome,
                last_timestamp: request.now,
            });
        summary.calls += 1;
        match outcome {
            GateOutcome::Allowed => summary.allowed += 1,
            GateOutcome::AllowedWithCorrection => summary.corrected += 1,
            GateOutcome::Blocked => summary.blocked += 1,
        }
        if timed_out {
            summary.timeouts += 1;
        }
        if low_confidence {
            summary.low_confidence_calls += 1;
        }
        summary.last_outcome = outcome;
        summary.last_timestamp = request.now;
    }
}
