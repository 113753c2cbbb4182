// crates/conduct-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Trajectory Store
// Description: Durable TrajectoryStore backed by SQLite WAL.
// Purpose: Persist trajectories, security events, and snapshots with integrity.
// Dependencies: conduct-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`TrajectoryStore`] on `SQLite` WAL. All
//! mutations flow through one writer thread fed by a bounded queue; a full
//! queue surfaces as an `Overloaded` error so the gate can apply its
//! back-pressure policy. Appends store a canonical digest beside each record
//! and reads verify it, failing closed on corruption. The database schema is
//! versioned and databases written by a newer schema are rejected on open.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::TrySendError;
use std::thread;
use std::time::Duration;

use conduct_gate_core::AgentId;
use conduct_gate_core::AttractorSnapshot;
use conduct_gate_core::AuditDigest;
use conduct_gate_core::DigestAlgorithm;
use conduct_gate_core::EventId;
use conduct_gate_core::PhaseState;
use conduct_gate_core::SNAPSHOT_FORMAT_VERSION;
use conduct_gate_core::SecurityEvent;
use conduct_gate_core::SecurityEventFilter;
use conduct_gate_core::SecurityEventRecord;
use conduct_gate_core::Timestamp;
use conduct_gate_core::TrajectoryEntry;
use conduct_gate_core::TrajectoryStore;
use conduct_gate_core::TrajectoryStoreError;
use conduct_gate_core::TrajectoryWindow;
use conduct_gate_core::hashing::AuditSeal;
use conduct_gate_core::hashing::seal;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4_096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Durability policy mapped onto `SQLite` synchronous pragmas.
///
/// # Invariants
/// - `EveryN` checkpoints the WAL after every `n` committed writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum FsyncPolicy {
    /// No fsync; fastest, weakest durability.
    Off,
    /// Fsync on every commit.
    #[default]
    Full,
    /// Normal synchronous mode with a checkpoint every `n` writes.
    EveryN {
        /// Commits between WAL checkpoints.
        n: u32,
    },
}

impl FsyncPolicy {
    /// Returns the `SQLite` `synchronous` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Full => "full",
            Self::EveryN {
                ..
            } => "normal",
        }
    }
}

/// Configuration for the `SQLite` trajectory store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `writer_queue_capacity` and `gc_batch_size` are greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Durability policy.
    #[serde(default)]
    pub fsync: FsyncPolicy,
    /// Writer queue capacity.
    #[serde(default = "default_writer_queue_capacity")]
    pub writer_queue_capacity: usize,
    /// Rows deleted per GC batch.
    #[serde(default = "default_gc_batch_size")]
    pub gc_batch_size: usize,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            fsync: FsyncPolicy::default(),
            writer_queue_capacity: default_writer_queue_capacity(),
            gc_batch_size: default_gc_batch_size(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default writer queue capacity.
const fn default_writer_queue_capacity() -> usize {
    1_024
}

/// Returns the default GC batch size.
const fn default_gc_batch_size() -> usize {
    512
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw state or event payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or digest mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema or blob version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// An append would violate per-agent timestamp ordering.
    #[error("sqlite store out-of-order append for {agent_id}")]
    OutOfOrder {
        /// Agent whose ordering would break.
        agent_id: String,
        /// Rejected entry timestamp (unix millis).
        timestamp: i64,
        /// Latest persisted timestamp for the agent (unix millis).
        latest: i64,
    },
    /// The writer queue is full and the caller should retry.
    #[error("sqlite store overloaded: {message}")]
    Overloaded {
        /// Retryable overload message.
        message: String,
        /// Optional retry delay in milliseconds.
        retry_after_ms: Option<u64>,
    },
}

impl From<SqliteStoreError> for TrajectoryStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::OutOfOrder {
                agent_id,
                timestamp,
                latest,
            } => Self::OutOfOrder {
                agent_id: AgentId::new(agent_id),
                timestamp: Timestamp::from_unix_millis(timestamp),
                latest: Timestamp::from_unix_millis(latest),
            },
            SqliteStoreError::Overloaded {
                message,
                retry_after_ms,
            } => Self::Overloaded {
                message,
                retry_after_ms,
            },
        }
    }
}

// ============================================================================
// SECTION: Writer Commands
// ============================================================================

/// Mutation queued to the writer thread.
enum WriterCommand {
    /// Persist a trajectory entry.
    AppendEntry {
        /// Agent identifier.
        agent_id: String,
        /// Entry timestamp (unix millis).
        timestamp: i64,
        /// Canonical JSON payload.
        entry_json: String,
        /// Canonical digest of the payload.
        entry_hash: String,
        /// Result channel.
        response: mpsc::Sender<Result<(), SqliteStoreError>>,
    },
    /// Persist a security event.
    AppendEvent {
        /// Agent identifier.
        agent_id: String,
        /// Event timestamp (unix millis).
        timestamp: i64,
        /// Whether the action was admitted.
        allowed: bool,
        /// Canonical JSON payload.
        event_json: String,
        /// Canonical digest of the payload.
        event_hash: String,
        /// Result channel carrying the assigned event id.
        response: mpsc::Sender<Result<i64, SqliteStoreError>>,
    },
    /// Persist an attractor snapshot.
    PublishSnapshot {
        /// Snapshot generation.
        generation: i64,
        /// Snapshot format version.
        format_version: i64,
        /// Snapshot timestamp (unix millis).
        computed_at: i64,
        /// Canonical JSON payload.
        snapshot_json: String,
        /// Canonical digest of the payload.
        snapshot_hash: String,
        /// Result channel.
        response: mpsc::Sender<Result<(), SqliteStoreError>>,
    },
    /// Delete records strictly below the horizon.
    Gc {
        /// Horizon timestamp (unix millis).
        horizon: i64,
        /// Result channel carrying the deleted-row count.
        response: mpsc::Sender<Result<u64, SqliteStoreError>>,
    },
}

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Store operation counters snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqliteStoreStats {
    /// Trajectory entries appended.
    pub entries_appended: u64,
    /// Security events appended.
    pub events_appended: u64,
    /// Writes rejected by queue saturation.
    pub writes_rejected: u64,
    /// Snapshot publications.
    pub snapshots_published: u64,
    /// Rows deleted by GC.
    pub gc_deleted: u64,
}

/// Shared atomic counters behind the stats snapshot.
#[derive(Debug, Default)]
struct StoreCounters {
    /// Trajectory entries appended.
    entries_appended: AtomicU64,
    /// Security events appended.
    events_appended: AtomicU64,
    /// Writes rejected by queue saturation.
    writes_rejected: AtomicU64,
    /// Snapshot publications.
    snapshots_published: AtomicU64,
    /// Rows deleted by GC.
    gc_deleted: AtomicU64,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed trajectory store with WAL and a bounded writer queue.
///
/// # Invariants
/// - All mutations are serialized through the writer thread.
/// - Reads verify stored digests before returning records.
#[derive(Clone)]
pub struct SqliteTrajectoryStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Bounded sender into the writer thread.
    writer: SyncSender<WriterCommand>,
    /// Read connection guarded by a mutex; WAL keeps reads non-blocking.
    read_connection: Arc<Mutex<Connection>>,
    /// Operation counters.
    counters: Arc<StoreCounters>,
}

impl SqliteTrajectoryStore {
    /// Opens (or creates) a trajectory store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened or initialized, or its schema is newer than this
    /// build supports.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        validate_runtime_limits(&config)?;
        ensure_parent_dir(&config.path)?;

        let mut write_connection = open_connection(&config, false)?;
        initialize_schema(&mut write_connection)?;
        let read_connection = open_connection(&config, true)?;

        let counters = Arc::new(StoreCounters::default());
        let (sender, receiver) = mpsc::sync_channel(config.writer_queue_capacity);
        spawn_writer(config.clone(), write_connection, receiver, Arc::clone(&counters));

        Ok(Self {
            config,
            writer: sender,
            read_connection: Arc::new(Mutex::new(read_connection)),
            counters,
        })
    }

    /// Returns a snapshot of the store's operation counters.
    #[must_use]
    pub fn stats(&self) -> SqliteStoreStats {
        SqliteStoreStats {
            entries_appended: self.counters.entries_appended.load(Ordering::Relaxed),
            events_appended: self.counters.events_appended.load(Ordering::Relaxed),
            writes_rejected: self.counters.writes_rejected.load(Ordering::Relaxed),
            snapshots_published: self.counters.snapshots_published.load(Ordering::Relaxed),
            gc_deleted: self.counters.gc_deleted.load(Ordering::Relaxed),
        }
    }

    /// Submits a command to the writer queue without blocking on capacity.
    fn submit<T>(
        &self,
        command: WriterCommand,
        receiver: &mpsc::Receiver<Result<T, SqliteStoreError>>,
    ) -> Result<T, SqliteStoreError> {
        match self.writer.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.counters.writes_rejected.fetch_add(1, Ordering::Relaxed);
                return Err(SqliteStoreError::Overloaded {
                    message: "writer queue full".to_string(),
                    retry_after_ms: Some(2),
                });
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(SqliteStoreError::Io("writer thread terminated".to_string()));
            }
        }
        receiver
            .recv_timeout(Duration::from_millis(self.config.busy_timeout_ms.max(1)))
            .map_err(|_| SqliteStoreError::Io("writer response timed out".to_string()))?
    }

    /// Runs a closure against the read connection.
    fn with_read<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let guard = self.read_connection.lock().unwrap_or_else(PoisonError::into_inner);
        operation(&guard)
    }
}

impl TrajectoryStore for SqliteTrajectoryStore {
    fn append_entry(&self, entry: &TrajectoryEntry) -> Result<(), TrajectoryStoreError> {
        let AuditSeal {
            bytes,
            digest,
        } = seal(entry).map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
        let entry_json = String::from_utf8(bytes)
            .map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
        let (sender, receiver) = mpsc::channel();
        self.submit(
            WriterCommand::AppendEntry {
                agent_id: entry.agent_id.as_str().to_string(),
                timestamp: entry.timestamp.as_unix_millis(),
                entry_json,
                entry_hash: digest.hex,
                response: sender,
            },
            &receiver,
        )?;
        Ok(())
    }

    fn append_security_event(
        &self,
        event: &SecurityEvent,
    ) -> Result<EventId, TrajectoryStoreError> {
        let AuditSeal {
            bytes,
            digest,
        } = seal(event).map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
        let event_json = String::from_utf8(bytes)
            .map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
        let (sender, receiver) = mpsc::channel();
        let raw_id = self.submit(
            WriterCommand::AppendEvent {
                agent_id: event.agent_id.as_str().to_string(),
                timestamp: event.timestamp.as_unix_millis(),
                allowed: event.allowed,
                event_json,
                event_hash: digest.hex,
                response: sender,
            },
            &receiver,
        )?;
        let raw_id = u64::try_from(raw_id)
            .map_err(|_| TrajectoryStoreError::Invalid("negative event id".to_string()))?;
        Ok(EventId::new(raw_id))
    }

    fn window(
        &self,
        agent_id: &AgentId,
        since: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<TrajectoryEntry>, TrajectoryStoreError> {
        let rows = self.with_read(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT entry_json, entry_hash FROM trajectory \
                     WHERE agent_id = ?1 AND ts >= ?2 AND ts < ?3 ORDER BY ts, seq",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = statement
                .query_map(
                    params![agent_id.as_str(), since.as_unix_millis(), until.as_unix_millis()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(rows)
        })?;
        rows.into_iter().map(|(json, hash)| decode_entry(&json, &hash)).collect()
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
        let rows = self.with_read(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT agent_id, entry_json, entry_hash FROM trajectory \
                     ORDER BY agent_id, ts, seq",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = statement
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(rows)
        })?;

        let mut windows = Vec::new();
        let mut current_agent: Option<String> = None;
        let mut states: Vec<PhaseState> = Vec::new();
        for (agent, json, hash) in rows {
            if current_agent.as_deref() != Some(agent.as_str()) {
                push_windows(&mut windows, current_agent.take(), &states, window_size);
                states.clear();
                current_agent = Some(agent);
            }
            states.push(decode_entry(&json, &hash)?.state);
        }
        push_windows(&mut windows, current_agent, &states, window_size);
        Ok(windows)
    }

    fn security_events(
        &self,
        filter: &SecurityEventFilter,
    ) -> Result<Vec<SecurityEventRecord>, TrajectoryStoreError> {
        let rows = self.with_read(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT event_id, event_json, event_hash FROM security_events \
                     ORDER BY event_id",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = statement
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(rows)
        })?;

        let mut out = Vec::new();
        for (raw_id, json, hash) in rows {
            let record = decode_event(raw_id, &json, &hash)?;
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
            out.push(record);
        }
        Ok(out)
    }

    fn publish_snapshot(
        &self,
        snapshot: &AttractorSnapshot,
    ) -> Result<(), TrajectoryStoreError> {
        let AuditSeal {
            bytes,
            digest,
        } = seal(snapshot).map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
        let snapshot_json = String::from_utf8(bytes)
            .map_err(|err| TrajectoryStoreError::Invalid(err.to_string()))?;
        let generation = i64::try_from(snapshot.generation)
            .map_err(|_| TrajectoryStoreError::Invalid("generation exceeds i64".to_string()))?;
        let (sender, receiver) = mpsc::channel();
        self.submit(
            WriterCommand::PublishSnapshot {
                generation,
                format_version: i64::from(snapshot.format_version),
                computed_at: snapshot.computed_at.as_unix_millis(),
                snapshot_json,
                snapshot_hash: digest.hex,
                response: sender,
            },
            &receiver,
        )?;
        Ok(())
    }

    fn latest_snapshot(&self) -> Result<Option<AttractorSnapshot>, TrajectoryStoreError> {
        let row = self.with_read(|connection| {
            connection
                .query_row(
                    "SELECT format_version, snapshot_json, snapshot_hash FROM snapshots \
                     ORDER BY generation DESC LIMIT 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })?;
        let Some((format_version, json, hash)) = row else {
            return Ok(None);
        };
        if format_version > i64::from(SNAPSHOT_FORMAT_VERSION) {
            return Err(TrajectoryStoreError::VersionMismatch(format!(
                "snapshot format {format_version} is newer than supported {SNAPSHOT_FORMAT_VERSION}"
            )));
        }
        verify_stored(&json, &hash)?;
        let snapshot: AttractorSnapshot = serde_json::from_str(&json)
            .map_err(|err| TrajectoryStoreError::Corrupt(err.to_string()))?;
        Ok(Some(snapshot))
    }

    fn gc(&self, horizon: Timestamp) -> Result<u64, TrajectoryStoreError> {
        let (sender, receiver) = mpsc::channel();
        let deleted = self.submit(
            WriterCommand::Gc {
                horizon: horizon.as_unix_millis(),
                response: sender,
            },
            &receiver,
        )?;
        Ok(deleted)
    }

    fn export_jsonl(&self) -> Result<Vec<String>, TrajectoryStoreError> {
        let mut lines = Vec::new();
        let entries = self.with_read(|connection| {
            let mut statement = connection
                .prepare("SELECT entry_json FROM trajectory ORDER BY agent_id, ts, seq")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = statement
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(rows)
        })?;
        for json in entries {
            lines.push(format!("{{\"record\":\"trajectory_entry\",\"entry\":{json}}}"));
        }
        let events = self.with_read(|connection| {
            let mut statement = connection
                .prepare("SELECT event_json FROM security_events ORDER BY event_id")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = statement
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(rows)
        })?;
        for json in events {
            lines.push(format!("{{\"record\":\"security_event\",\"event\":{json}}}"));
        }
        Ok(lines)
    }

    fn readiness(&self) -> Result<(), TrajectoryStoreError> {
        self.with_read(|connection| {
            connection
                .execute_batch("SELECT 1")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Decoding Helpers
// ============================================================================

/// Verifies a stored digest against the persisted JSON payload.
fn verify_stored(json: &str, hash: &str) -> Result<(), TrajectoryStoreError> {
    AuditDigest::from_hex(DigestAlgorithm::default(), hash)
        .verify(json.as_bytes())
        .map_err(|err| TrajectoryStoreError::Corrupt(err.to_string()))
}

/// Decodes and verifies one trajectory row.
fn decode_entry(json: &str, hash: &str) -> Result<TrajectoryEntry, TrajectoryStoreError> {
    verify_stored(json, hash)?;
    serde_json::from_str(json).map_err(|err| TrajectoryStoreError::Corrupt(err.to_string()))
}

/// Decodes and verifies one security event row.
fn decode_event(
    raw_id: i64,
    json: &str,
    hash: &str,
) -> Result<SecurityEventRecord, TrajectoryStoreError> {
    verify_stored(json, hash)?;
    let event: SecurityEvent = serde_json::from_str(json)
        .map_err(|err| TrajectoryStoreError::Corrupt(err.to_string()))?;
    let event_id = u64::try_from(raw_id)
        .map_err(|_| TrajectoryStoreError::Corrupt("negative event id".to_string()))?;
    Ok(SecurityEventRecord {
        event_id: EventId::new(event_id),
        event,
        digest: AuditDigest::from_hex(DigestAlgorithm::default(), hash),
    })
}

/// Appends sliding windows for one agent's state sequence.
fn push_windows(
    windows: &mut Vec<TrajectoryWindow>,
    agent: Option<String>,
    states: &[PhaseState],
    window_size: usize,
) {
    let Some(agent) = agent else {
        return;
    };
    if states.len() < window_size {
        return;
    }
    for start in 0 ..= states.len() - window_size {
        windows.push(TrajectoryWindow {
            agent_id: AgentId::new(agent.clone()),
            states: states[start .. start + window_size].to_vec(),
        });
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Validates the configured database path.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let rendered = path.to_string_lossy();
    if rendered.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path component too long".to_string()));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path is a directory".to_string()));
    }
    Ok(())
}

/// Validates runtime limits in the store configuration.
fn validate_runtime_limits(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    if config.writer_queue_capacity == 0 {
        return Err(SqliteStoreError::Invalid(
            "writer_queue_capacity must be greater than zero".to_string(),
        ));
    }
    if config.gc_batch_size == 0 {
        return Err(SqliteStoreError::Invalid(
            "gc_batch_size must be greater than zero".to_string(),
        ));
    }
    if let FsyncPolicy::EveryN {
        n,
    } = config.fsync
        && n == 0
    {
        return Err(SqliteStoreError::Invalid(
            "fsync every_n requires n greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Creates the parent directory of the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens a connection with the configured pragmas.
fn open_connection(
    config: &SqliteStoreConfig,
    read_only: bool,
) -> Result<Connection, SqliteStoreError> {
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if !read_only {
        connection
            .pragma_update(None, "journal_mode", "wal")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "synchronous", config.fsync.pragma_value())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(connection)
}

/// Creates tables and enforces the schema version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);\n\
             CREATE TABLE IF NOT EXISTS trajectory (\n\
                 agent_id TEXT NOT NULL,\n\
                 ts INTEGER NOT NULL,\n\
                 seq INTEGER NOT NULL,\n\
                 entry_json TEXT NOT NULL,\n\
                 entry_hash TEXT NOT NULL,\n\
                 PRIMARY KEY (agent_id, ts, seq)\n\
             );\n\
             CREATE TABLE IF NOT EXISTS security_events (\n\
                 event_id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
                 agent_id TEXT NOT NULL,\n\
                 ts INTEGER NOT NULL,\n\
                 allowed INTEGER NOT NULL,\n\
                 event_json TEXT NOT NULL,\n\
                 event_hash TEXT NOT NULL\n\
             );\n\
             CREATE TABLE IF NOT EXISTS snapshots (\n\
                 generation INTEGER PRIMARY KEY,\n\
                 format_version INTEGER NOT NULL,\n\
                 computed_at INTEGER NOT NULL,\n\
                 snapshot_json TEXT NOT NULL,\n\
                 snapshot_hash TEXT NOT NULL\n\
             );\n\
             CREATE INDEX IF NOT EXISTS idx_trajectory_ts ON trajectory (ts);\n\
             CREATE INDEX IF NOT EXISTS idx_security_events_ts ON security_events (ts);",
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

    let stored: Option<i64> = connection
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match stored {
        None => {
            connection
                .execute("INSERT INTO schema_version (version) VALUES (?1)", [SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(version) if version > SCHEMA_VERSION => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "database schema {version} is newer than supported {SCHEMA_VERSION}"
            )));
        }
        Some(_) => {}
    }
    Ok(())
}

// ============================================================================
// SECTION: Writer Thread
// ============================================================================

/// Spawns the single writer thread draining the bounded queue.
fn spawn_writer(
    config: SqliteStoreConfig,
    connection: Connection,
    receiver: mpsc::Receiver<WriterCommand>,
    counters: Arc<StoreCounters>,
) {
    // A spawn failure drops the receiver; submissions then fail with a
    // disconnected error on first use.
    let _ = thread::Builder::new()
        .name("conduct-gate-sqlite-writer".to_string())
        .spawn(move || writer_loop(&config, &connection, &receiver, &counters));
}

/// Drains writer commands until every sender is dropped.
fn writer_loop(
    config: &SqliteStoreConfig,
    connection: &Connection,
    receiver: &mpsc::Receiver<WriterCommand>,
    counters: &StoreCounters,
) {
    let mut latest_per_agent: std::collections::BTreeMap<String, i64> =
        std::collections::BTreeMap::new();
    let mut seq: i64 = connection
        .query_row("SELECT COALESCE(MAX(seq), 0) FROM trajectory", [], |row| row.get(0))
        .unwrap_or(0);
    let mut writes_since_checkpoint: u32 = 0;

    while let Ok(command) = receiver.recv() {
        match command {
            WriterCommand::AppendEntry {
                agent_id,
                timestamp,
                entry_json,
                entry_hash,
                response,
            } => {
                let result = append_entry_row(
                    connection,
                    &mut latest_per_agent,
                    &mut seq,
                    &agent_id,
                    timestamp,
                    &entry_json,
                    &entry_hash,
                );
                if result.is_ok() {
                    counters.entries_appended.fetch_add(1, Ordering::Relaxed);
                }
                let _ = response.send(result);
            }
            WriterCommand::AppendEvent {
                agent_id,
                timestamp,
                allowed,
                event_json,
                event_hash,
                response,
            } => {
                let result = connection
                    .execute(
                        "INSERT INTO security_events \
                         (agent_id, ts, allowed, event_json, event_hash) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![agent_id, timestamp, i64::from(allowed), event_json, event_hash],
                    )
                    .map(|_| connection.last_insert_rowid())
                    .map_err(|err| SqliteStoreError::Db(err.to_string()));
                if result.is_ok() {
                    counters.events_appended.fetch_add(1, Ordering::Relaxed);
                }
                let _ = response.send(result);
            }
            WriterCommand::PublishSnapshot {
                generation,
                format_version,
                computed_at,
                snapshot_json,
                snapshot_hash,
                response,
            } => {
                let result = publish_snapshot_row(
                    connection,
                    generation,
                    format_version,
                    computed_at,
                    &snapshot_json,
                    &snapshot_hash,
                );
                if result.is_ok() {
                    counters.snapshots_published.fetch_add(1, Ordering::Relaxed);
                }
                let _ = response.send(result);
            }
            WriterCommand::Gc {
                horizon,
                response,
            } => {
                let result = gc_rows(connection, horizon, config.gc_batch_size);
                if let Ok(deleted) = &result {
                    counters.gc_deleted.fetch_add(*deleted, Ordering::Relaxed);
                    latest_per_agent.clear();
                }
                let _ = response.send(result);
            }
        }

        if let FsyncPolicy::EveryN {
            n,
        } = config.fsync
        {
            writes_since_checkpoint += 1;
            if writes_since_checkpoint >= n {
                writes_since_checkpoint = 0;
                let _ = connection.execute_batch("PRAGMA wal_checkpoint(PASSIVE);");
            }
        }
    }
}

/// Appends one trajectory row, enforcing per-agent ordering.
fn append_entry_row(
    connection: &Connection,
    latest_per_agent: &mut std::collections::BTreeMap<String, i64>,
    seq: &mut i64,
    agent_id: &str,
    timestamp: i64,
    entry_json: &str,
    entry_hash: &str,
) -> Result<(), SqliteStoreError> {
    let latest = match latest_per_agent.get(agent_id) {
        Some(latest) => Some(*latest),
        None => connection
            .query_row(
                "SELECT MAX(ts) FROM trajectory WHERE agent_id = ?1",
                [agent_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?,
    };
    if let Some(latest) = latest
        && timestamp < latest
    {
        return Err(SqliteStoreError::OutOfOrder {
            agent_id: agent_id.to_string(),
            timestamp,
            latest,
        });
    }
    *seq += 1;
    connection
        .execute(
            "INSERT INTO trajectory (agent_id, ts, seq, entry_json, entry_hash) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![agent_id, timestamp, *seq, entry_json, entry_hash],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    latest_per_agent.insert(agent_id.to_string(), timestamp);
    Ok(())
}

/// Inserts a snapshot row, enforcing monotonic generations.
fn publish_snapshot_row(
    connection: &Connection,
    generation: i64,
    format_version: i64,
    computed_at: i64,
    snapshot_json: &str,
    snapshot_hash: &str,
) -> Result<(), SqliteStoreError> {
    let latest: Option<i64> = connection
        .query_row("SELECT MAX(generation) FROM snapshots", [], |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if let Some(latest) = latest
        && generation <= latest
    {
        return Err(SqliteStoreError::Invalid(format!(
            "snapshot generation {generation} is not greater than {latest}"
        )));
    }
    connection
        .execute(
            "INSERT INTO snapshots \
             (generation, format_version, computed_at, snapshot_json, snapshot_hash) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![generation, format_version, computed_at, snapshot_json, snapshot_hash],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Deletes rows strictly below the horizon in bounded batches.
fn gc_rows(
    connection: &Connection,
    horizon: i64,
    batch_size: usize,
) -> Result<u64, SqliteStoreError> {
    let batch = i64::try_from(batch_size).unwrap_or(i64::MAX);
    let mut deleted: u64 = 0;
    loop {
        let removed = connection
            .execute(
                "DELETE FROM trajectory WHERE rowid IN \
                 (SELECT rowid FROM trajectory WHERE ts < ?1 LIMIT ?2)",
                params![horizon, batch],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        deleted += removed as u64;
        if removed < batch_size {
            break;
        }
    }
    loop {
        let removed = connection
            .execute(
                "DELETE FROM security_events WHERE rowid IN \
                 (SELECT rowid FROM security_events WHERE ts < ?1 LIMIT ?2)",
                params![horizon, batch],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        deleted += removed as u64;
        if removed < batch_size {
            break;
        }
    }
    Ok(deleted)
}
