// crates/consent-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Confirmation Store
// Description: Durable ConfirmationStore backed by SQLite.
// Purpose: Persist pending confirmations with atomic state transitions.
// Dependencies: consent-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`ConfirmationStore`] using `SQLite`. Each
//! confirmation is one row keyed by token digest. State transitions are a
//! single conditional `UPDATE ... WHERE status = 'pending'`, so at most one
//! resolver wins even across processes sharing the database file.
//! Security posture: database contents are untrusted; loads fail closed on
//! unknown labels or malformed argument payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use consent_gate_core::CapabilityArguments;
use consent_gate_core::CapabilityKind;
use consent_gate_core::CapabilityName;
use consent_gate_core::ConfirmationStatus;
use consent_gate_core::ConfirmationStore;
use consent_gate_core::IdentityKey;
use consent_gate_core::PendingConfirmation;
use consent_gate_core::StoreError;
use consent_gate_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
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
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized argument payload accepted by the store.
pub const MAX_ARGUMENTS_BYTES: usize = 1024 * 1024;
/// Column list shared by every record query.
const RECORD_COLUMNS: &str = "token_digest, kind, capability, arguments_json, requester_issuer, \
                              requester_subject, created_at, expires_at, status, resolved_at";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` confirmation store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default pragmas.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages never embed token digests or stored arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row could not be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Argument payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "arguments_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a rusqlite error into the store error space.
#[allow(clippy::needless_pass_by_value, reason = "Used directly with map_err.")]
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed confirmation store.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
/// - Only rows in the `pending` state are ever updated.
#[derive(Clone)]
pub struct SqliteConfirmationStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteConfirmationStore {
    /// Opens an `SQLite`-backed confirmation store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Verifies the store can execute a simple SQL statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the mutex is poisoned or the query fails.
    pub fn readiness(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard.query_row("SELECT 1", [], |_| Ok(())).map_err(db_error)
    }

    /// Counts records in the given state.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn count_by_status(&self, status: ConfirmationStatus) -> Result<usize, SqliteStoreError> {
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(1) FROM confirmations WHERE status = ?1",
                params![status.label()],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        usize::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt("negative record count".to_string()))
    }

    /// Acquires the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Inserts a record.
    fn insert_record(&self, record: &PendingConfirmation) -> Result<(), SqliteStoreError> {
        let arguments_json = serde_json::to_string(&record.arguments)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if arguments_json.len() > MAX_ARGUMENTS_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_ARGUMENTS_BYTES,
                actual_bytes: arguments_json.len(),
            });
        }
        let guard = self.lock()?;
        let inserted = guard
            .execute(
                "INSERT OR IGNORE INTO confirmations (token_digest, kind, capability, \
                 arguments_json, requester_issuer, requester_subject, created_at, expires_at, \
                 status, resolved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.token_digest,
                    record.kind.label(),
                    record.capability.as_str(),
                    arguments_json,
                    record.requester.issuer,
                    record.requester.subject,
                    record.created_at.as_unix_millis(),
                    record.expires_at.as_unix_millis(),
                    record.status.label(),
                    record.resolved_at.map(Timestamp::as_unix_millis),
                ],
            )
            .map_err(db_error)?;
        if inserted == 0 {
            return Err(SqliteStoreError::Invalid("confirmation token collision".to_string()));
        }
        Ok(())
    }

    /// Loads a record by digest.
    fn load_record(
        &self,
        token_digest: &str,
    ) -> Result<Option<PendingConfirmation>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM confirmations WHERE token_digest = ?1"),
                params![token_digest],
                map_record_row,
            )
            .optional()
            .map_err(db_error)?;
        row.map(RecordRow::into_record).transpose()
    }

    /// Applies a conditional transition.
    fn transition_record(
        &self,
        token_digest: &str,
        status: ConfirmationStatus,
        at: Timestamp,
    ) -> Result<bool, SqliteStoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE confirmations SET status = ?1, resolved_at = ?2 WHERE token_digest = ?3 \
                 AND status = 'pending'",
                params![status.label(), at.as_unix_millis(), token_digest],
            )
            .map_err(db_error)?;
        Ok(changed == 1)
    }

    /// Expires lapsed pending rows.
    fn expire_records(&self, now: Timestamp) -> Result<usize, SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "UPDATE confirmations SET status = 'expired', resolved_at = ?1 WHERE status = \
                 'pending' AND expires_at < ?1",
                params![now.as_unix_millis()],
            )
            .map_err(db_error)
    }

    /// Deletes terminal rows resolved before the cutoff.
    fn purge_records(&self, resolved_before: Timestamp) -> Result<usize, SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "DELETE FROM confirmations WHERE status != 'pending' AND resolved_at IS NOT NULL \
                 AND resolved_at < ?1",
                params![resolved_before.as_unix_millis()],
            )
            .map_err(db_error)
    }

    /// Lists pending, unexpired rows for a requester.
    fn list_records(
        &self,
        requester: &IdentityKey,
        now: Timestamp,
    ) -> Result<Vec<PendingConfirmation>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM confirmations WHERE status = 'pending' AND \
                 expires_at >= ?1 AND requester_subject = ?2 AND requester_issuer IS ?3 ORDER BY \
                 created_at ASC, token_digest ASC"
            ))
            .map_err(db_error)?;
        let rows = statement
            .query_map(
                params![now.as_unix_millis(), requester.subject, requester.issuer],
                map_record_row,
            )
            .map_err(db_error)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(db_error)?.into_record()?);
        }
        Ok(records)
    }
}

impl ConfirmationStore for SqliteConfirmationStore {
    fn insert(&self, record: &PendingConfirmation) -> Result<(), StoreError> {
        self.insert_record(record).map_err(StoreError::from)
    }

    fn load(&self, token_digest: &str) -> Result<Option<PendingConfirmation>, StoreError> {
        self.load_record(token_digest).map_err(StoreError::from)
    }

    fn transition(
        &self,
        token_digest: &str,
        status: ConfirmationStatus,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        self.transition_record(token_digest, status, at).map_err(StoreError::from)
    }

    fn expire_pending(&self, now: Timestamp) -> Result<usize, StoreError> {
        self.expire_records(now).map_err(StoreError::from)
    }

    fn purge_resolved(&self, resolved_before: Timestamp) -> Result<usize, StoreError> {
        self.purge_records(resolved_before).map_err(StoreError::from)
    }

    fn list_pending(
        &self,
        requester: &IdentityKey,
        now: Timestamp,
    ) -> Result<Vec<PendingConfirmation>, StoreError> {
        self.list_records(requester, now).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw column values for one confirmation row.
struct RecordRow {
    /// Token digest.
    token_digest: String,
    /// Capability kind label.
    kind: String,
    /// Capability name.
    capability: String,
    /// Serialized argument object.
    arguments_json: String,
    /// Requester issuer.
    requester_issuer: Option<String>,
    /// Requester subject.
    requester_subject: String,
    /// Creation time (unix millis).
    created_at: i64,
    /// Expiry time (unix millis).
    expires_at: i64,
    /// Status label.
    status: String,
    /// Resolution time (unix millis).
    resolved_at: Option<i64>,
}

impl RecordRow {
    /// Decodes labels and arguments into a typed record.
    fn into_record(self) -> Result<PendingConfirmation, SqliteStoreError> {
        let kind = CapabilityKind::parse(&self.kind)
            .ok_or_else(|| SqliteStoreError::Corrupt(format!("unknown kind: {}", self.kind)))?;
        let status = ConfirmationStatus::parse(&self.status)
            .ok_or_else(|| SqliteStoreError::Corrupt(format!("unknown status: {}", self.status)))?;
        if self.arguments_json.len() > MAX_ARGUMENTS_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_ARGUMENTS_BYTES,
                actual_bytes: self.arguments_json.len(),
            });
        }
        let arguments: CapabilityArguments = serde_json::from_str(&self.arguments_json)
            .map_err(|err| SqliteStoreError::Corrupt(format!("arguments_json: {err}")))?;
        Ok(PendingConfirmation {
            token_digest: self.token_digest,
            kind,
            capability: CapabilityName::new(self.capability),
            arguments,
            requester: IdentityKey {
                issuer: self.requester_issuer,
                subject: self.requester_subject,
            },
            created_at: Timestamp::from_unix_millis(self.created_at),
            expires_at: Timestamp::from_unix_millis(self.expires_at),
            status,
            resolved_at: self.resolved_at.map(Timestamp::from_unix_millis),
        })
    }
}

/// Reads a row selected with [`RECORD_COLUMNS`].
fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        token_digest: row.get(0)?,
        kind: row.get(1)?,
        capability: row.get(2)?,
        arguments_json: row.get(3)?,
        requester_issuer: row.get(4)?,
        requester_subject: row.get(5)?,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
        status: row.get(8)?,
        resolved_at: row.get(9)?,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS confirmations (
                    token_digest TEXT PRIMARY KEY NOT NULL,
                    kind TEXT NOT NULL,
                    capability TEXT NOT NULL,
                    arguments_json TEXT NOT NULL,
                    requester_issuer TEXT,
                    requester_subject TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    resolved_at INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_confirmations_requester
                    ON confirmations (requester_subject, status, created_at);
                CREATE INDEX IF NOT EXISTS idx_confirmations_status_expiry
                    ON confirmations (status, expires_at);",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}
