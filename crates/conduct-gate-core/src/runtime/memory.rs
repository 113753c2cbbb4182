// crates/conduct-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: Conduct Gate In-Memory Store
// Description: In-memory trajectory store for tests and examples.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`TrajectoryStore`]
//! for tests and local demos. It enforces the same contracts as durable
//! stores: per-agent timestamp ordering, digest-verified security events,
//! monotonic snapshot generations, and horizon-bounded garbage collection.
//! It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AgentId;
use crate::core::AttractorSnapshot;
use crate::core::EventId;
use crate::core::SNAPSHOT_FORMAT_VERSION;
use crate::core::SecurityEvent;
use crate::core::Timestamp;
use crate::core::TrajectoryEntry;
use crate::core::hashing::canonical_bytes;
use crate::core::hashing::seal;
use crate::interfaces::SecurityEventFilter;
use crate::interfaces::SecurityEventRecord;
use crate::interfaces::TrajectoryStore;
use crate::interfaces::TrajectoryStoreError;
use crate::interfaces::TrajectoryWindow;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable store contents behind the mutex.
#[derive(Debug, Default)]
struct StoreInner {
    /// Trajectory entries per agent, in append order.
    entries: BTreeMap<AgentId, Vec<TrajectoryEntry>>,
    /// Security event log, in append order.
    events: Vec<SecurityEventRecord>,
    /// Next security event sequence value.
    next_event_id: u64,
    /// Latest published attractor snapshot.
    snapshot: Option<AttractorSnapshot>,
}

/// In-memory trajectory store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrajectoryStore {
    /// Store contents protected by a mutex.
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryTrajectoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store contents.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, TrajectoryStoreError> {
        self.inner
            .lock()
            .map_err(|_| TrajectoryStoreError::Store("trajectory store mutex poisoned".to_string()))
    }
}

impl TrajectoryStore for InMemoryTrajectoryStore {
    fn append_entry(&self, entry: &TrajectoryEntry) -> Result<(), TrajectoryStoreError> {
        let mut inner = self.lock()?;
        let log = inner.entries.entry(entry.agent_id.clone()).or_default();
        if let Some(last) = log.last()
            && entry.timestamp < last.timestamp
        {
            return Err(TrajectoryStoreError::OutOfOrder {
                agent_id: entry.agent_id.clone(),
                timestamp: entry.timestamp,
                latest: last.timestamp,
            });
        }
        log.push(entry.clone());
        Ok(())
    }

    fn append_security_event(
        &self,
        event: &SecurityEvent,
    ) -> Result<EventId, TrajectoryStoreError> {
        let sealed =
            seal(event).map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
        let mut inner = self.lock()?;
        let event_id = EventId::new(inner.next_event_id);
        inner.next_event_id += 1;
        inner.events.push(SecurityEventRecord {
            event_id,
            event: event.clone(),
            digest: sealed.digest,
        });
        Ok(event_id)
    }

    fn window(
        &self,
        agent_id: &AgentId,
        since: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<TrajectoryEntry>, TrajectoryStoreError> {
        let inner = self.lock()?;
        Ok(inner.entries.get(agent_id).map_or_else(Vec::new, |log| {
            log.iter()
                .filter(|entry| entry.timestamp >= since && entry.timestamp < until)
                .cloned()
                .collect()
        }))
    }

    fn all_trajectories(
        &self,
        window_size: usize,
    ) -> Result<Vec<TrajectoryWindow>, TrajectoryStoreError> {
        if window_size == 0 {
            return Err(TrajectoryStoreError::Invalid(
                "window_size must be greater than zero".to_string(),
            ));
        }
        let inner = self.lock()?;
        let mut windows = Vec::new();
        for (agent_id, log) in &inner.entries {
            if log.len() < window_size {
                continue;
            }
            for start in 0 ..= log.len() - window_size {
                windows.push(TrajectoryWindow {
                    agent_id: agent_id.clone(),
                    states: log[start .. start + window_size]
                        .iter()
                        .map(|entry| entry.state.clone())
                        .collect(),
                });
            }
        }
        Ok(windows)
    }

    fn security_events(
        &self,
        filter: &SecurityEventFilter,
    ) -> Result<Vec<SecurityEventRecord>, TrajectoryStoreError> {
        let inner = self.lock()?;
        let mut out = Vec::new();
        for record in &inner.events {
            if let Some(agent_id) = &filter.agent_id
                && &record.event.agent_id != agent_id
            {
                continue;
            }
            if let Some(since) = filter.since
                && record.event.timestamp < since
            {
                continue;
            }
            if let Some(until) = filter.until
                && record.event.timestamp >= until
            {
                continue;
            }
            if filter.blocked_only && record.event.allowed {
                continue;
            }
            let bytes = canonical_bytes(&record.event)
                .map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
            record
                .digest
                .verify(&bytes)
                .map_err(|err| TrajectoryStoreError::Corrupt(err.to_string()))?;
            out.push(record.clone());
        }
        Ok(out)
    }

    fn publish_snapshot(
        &self,
        snapshot: &AttractorSnapshot,
    ) -> Result<(), TrajectoryStoreError> {
        let mut inner = self.lock()?;
        if let Some(current) = &inner.snapshot
            && snapshot.generation <= current.generation
        {
            return Err(TrajectoryStoreError::Invalid(format!(
                "snapshot generation {} is not greater than {}",
                snapshot.generation, current.generation
            )));
        }
        inner.snapshot = Some(snapshot.clone());
        Ok(())
    }

    fn latest_snapshot(&self) -> Result<Option<AttractorSnapshot>, TrajectoryStoreError> {
        let inner = self.lock()?;
        if let Some(snapshot) = &inner.snapshot
            && snapshot.format_version > SNAPSHOT_FORMAT_VERSION
        {
            return Err(TrajectoryStoreError::VersionMismatch(format!(
                "snapshot format {} is newer than supported {}",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(inner.snapshot.clone())
    }

    fn gc(&self, horizon: Timestamp) -> Result<u64, TrajectoryStoreError> {
        let mut inner = self.lock()?;
        let mut deleted = 0u64;
        for log in inner.entries.values_mut() {
            let before = log.len();
            log.retain(|entry| entry.timestamp >= horizon);
            deleted += (before - log.len()) as u64;
        }
        let before = inner.events.len();
        inner.events.retain(|record| record.event.timestamp >= horizon);
        deleted += (before - inner.events.len()) as u64;
        Ok(deleted)
    }

    fn export_jsonl(&self) -> Result<Vec<String>, TrajectoryStoreError> {
        let inner = self.lock()?;
        let mut lines = Vec::new();
        for log in inner.entries.values() {
            for entry in log {
                let line = serde_json::to_string(&serde_json::json!({
                    "record": "trajectory_entry",
                    "entry": entry,
                }))
                .map_err(|err| TrajectoryStoreError::Store(err.to_string()))?;
                lines.push(line);
            }
        }
        for record in &inner.events {
            let line = serde_json::to_string(&serde_json::json!({
                "record": "security_event",
                "event": record,
            }))
            .map_err(|err| TrajectoryStoreError::Store(err.to_string()))?;
            lines.push(line);
        }
        Ok(lines)
    }
}
