// crates/consent-gate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Confirmation Store Unit Tests
// Description: Targeted tests for the SQLite confirmation store.
// Purpose: Validate path safety, schema versioning, atomic transitions,
//          expiry, retention, and corruption detection.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` store invariants:
//! - Path safety checks (directory rejection)
//! - Schema version validation
//! - Single-winner transitions, including across connections
//! - Expiry sweep, retention purge, and per-requester listing
//! - Fail-closed decoding of tampered rows

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use consent_gate_core::CapabilityKind;
use consent_gate_core::CapabilityName;
use consent_gate_core::ConfirmationStatus;
use consent_gate_core::ConfirmationStore;
use consent_gate_core::ConfirmationToken;
use consent_gate_core::IdentityKey;
use consent_gate_core::PendingConfirmation;
use consent_gate_core::StoreError;
use consent_gate_core::Timestamp;
use consent_gate_store_sqlite::SqliteConfirmationStore;
use consent_gate_store_sqlite::SqliteStoreConfig;
use consent_gate_store_sqlite::SqliteStoreError;
use consent_gate_store_sqlite::SqliteStoreMode;
use consent_gate_store_sqlite::SqliteSyncMode;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::Map;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_for_path(path: &Path) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    }
}

fn store_for(path: &Path) -> SqliteConfirmationStore {
    SqliteConfirmationStore::new(config_for_path(path)).expect("store init")
}

fn requester(subject: &str) -> IdentityKey {
    IdentityKey {
        issuer: Some("https://issuer.test".to_string()),
        subject: subject.to_string(),
    }
}

fn record(subject: &str, created_at: i64, ttl_millis: i64) -> PendingConfirmation {
    let mut arguments = Map::new();
    arguments.insert("to".to_string(), json!("bob@example.com"));
    PendingConfirmation {
        token_digest: ConfirmationToken::generate().digest(),
        kind: CapabilityKind::Tool,
        capability: CapabilityName::new("sendEmail"),
        arguments,
        requester: requester(subject),
        created_at: Timestamp::from_unix_millis(created_at),
        expires_at: Timestamp::from_unix_millis(created_at + ttl_millis),
        status: ConfirmationStatus::Pending,
        resolved_at: None,
    }
}

// ============================================================================
// SECTION: Path and Schema
// ============================================================================

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let Err(err) = SqliteConfirmationStore::new(config_for_path(temp.path())) else {
        panic!("expected invalid directory path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("deeper").join("store.db");
    let store = store_for(&path);
    store.readiness().unwrap();
    assert!(path.exists());
}

#[test]
fn sqlite_store_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    {
        let connection = Connection::open(&path).unwrap();
        connection
            .execute_batch(
                "CREATE TABLE store_meta (version INTEGER NOT NULL);
                 INSERT INTO store_meta (version) VALUES (99);",
            )
            .unwrap();
    }
    let Err(err) = SqliteConfirmationStore::new(config_for_path(&path)) else {
        panic!("expected version mismatch");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn sqlite_store_delete_journal_mode_opens() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for_path(&temp.path().join("store.db"));
    config.journal_mode = SqliteStoreMode::Delete;
    config.sync_mode = SqliteSyncMode::Normal;
    let store = SqliteConfirmationStore::new(config).unwrap();
    store.readiness().unwrap();
}

// ============================================================================
// SECTION: Records
// ============================================================================

#[test]
fn sqlite_store_round_trips_records_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let original = record("alice", 1_000, 300_000);
    {
        let store = store_for(&path);
        store.insert(&original).unwrap();
    }
    let store = store_for(&path);
    let loaded = store.load(&original.token_digest).unwrap().expect("record");
    assert_eq!(loaded, original);
    assert!(store.load("missing").unwrap().is_none());
}

#[test]
fn sqlite_store_rejects_duplicate_digest() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let original = record("alice", 1_000, 300_000);
    store.insert(&original).unwrap();
    let err = store.insert(&original).expect_err("collision");
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn sqlite_store_transition_wins_once() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let original = record("alice", 1_000, 300_000);
    store.insert(&original).unwrap();
    let at = Timestamp::from_unix_millis(2_000);
    assert!(store.transition(&original.token_digest, ConfirmationStatus::Denied, at).unwrap());
    assert!(!store.transition(&original.token_digest, ConfirmationStatus::Approved, at).unwrap());
    let loaded = store.load(&original.token_digest).unwrap().unwrap();
    assert_eq!(loaded.status, ConfirmationStatus::Denied);
    assert_eq!(loaded.resolved_at, Some(at));
    assert!(!store.transition("missing", ConfirmationStatus::Denied, at).unwrap());
}

#[test]
fn sqlite_store_transition_is_atomic_across_connections() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let original = record("alice", 1_000, 300_000);
    store_for(&path).insert(&original).unwrap();
    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0 .. workers)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let digest = original.token_digest.clone();
            let path = path.clone();
            thread::spawn(move || {
                let store = store_for(&path);
                barrier.wait();
                store
                    .transition(
                        &digest,
                        ConfirmationStatus::Approved,
                        Timestamp::from_unix_millis(2_000),
                    )
                    .unwrap()
            })
        })
        .collect();
    let winners = handles.into_iter().map(|handle| handle.join().unwrap()).filter(|won| *won).count();
    assert_eq!(winners, 1);
}

// ============================================================================
// SECTION: Expiry, Retention, Listing
// ============================================================================

#[test]
fn sqlite_store_expires_lapsed_pending_only() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let lapsed = record("alice", 1_000, 500);
    let live = record("alice", 1_000, 60_000);
    let denied = record("alice", 1_000, 1_000);
    for item in [&lapsed, &live, &denied] {
        store.insert(item).unwrap();
    }
    store
        .transition(&denied.token_digest, ConfirmationStatus::Denied, Timestamp::from_unix_millis(1_500))
        .unwrap();
    let expired = store.expire_pending(Timestamp::from_unix_millis(2_000)).unwrap();
    assert_eq!(expired, 1);
    assert_eq!(
        store.load(&lapsed.token_digest).unwrap().unwrap().status,
        ConfirmationStatus::Expired
    );
    assert_eq!(store.load(&live.token_digest).unwrap().unwrap().status, ConfirmationStatus::Pending);
    assert_eq!(
        store.load(&denied.token_digest).unwrap().unwrap().status,
        ConfirmationStatus::Denied
    );
    assert_eq!(store.count_by_status(ConfirmationStatus::Expired).unwrap(), 1);
}

#[test]
fn sqlite_store_keeps_records_pending_at_their_deadline() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let item = record("alice", 1_000, 1_000);
    store.insert(&item).unwrap();
    let deadline = Timestamp::from_unix_millis(2_000);
    assert_eq!(store.expire_pending(deadline).unwrap(), 0);
    assert_eq!(store.list_pending(&requester("alice"), deadline).unwrap().len(), 1);
    assert_eq!(store.expire_pending(Timestamp::from_unix_millis(2_001)).unwrap(), 1);
}

#[test]
fn sqlite_store_purges_old_terminal_records() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let old = record("alice", 1_000, 60_000);
    let recent = record("alice", 1_000, 60_000);
    let pending = record("alice", 1_000, 60_000);
    for item in [&old, &recent, &pending] {
        store.insert(item).unwrap();
    }
    store
        .transition(&old.token_digest, ConfirmationStatus::Denied, Timestamp::from_unix_millis(2_000))
        .unwrap();
    store
        .transition(
            &recent.token_digest,
            ConfirmationStatus::Approved,
            Timestamp::from_unix_millis(9_000),
        )
        .unwrap();
    let purged = store.purge_resolved(Timestamp::from_unix_millis(5_000)).unwrap();
    assert_eq!(purged, 1);
    assert!(store.load(&old.token_digest).unwrap().is_none());
    assert!(store.load(&recent.token_digest).unwrap().is_some());
    assert!(store.load(&pending.token_digest).unwrap().is_some());
}

#[test]
fn sqlite_store_lists_pending_per_requester() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let second = record("alice", 2_000, 60_000);
    let first = record("alice", 1_000, 60_000);
    let lapsed = record("alice", 1_000, 500);
    let other = record("bob", 1_000, 60_000);
    let mut anonymous_issuer = record("alice", 1_000, 60_000);
    anonymous_issuer.requester.issuer = None;
    for item in [&second, &first, &lapsed, &other, &anonymous_issuer] {
        store.insert(item).unwrap();
    }
    let listed = store.list_pending(&requester("alice"), Timestamp::from_unix_millis(3_000)).unwrap();
    let digests: Vec<&str> = listed.iter().map(|item| item.token_digest.as_str()).collect();
    assert_eq!(digests, vec![first.token_digest.as_str(), second.token_digest.as_str()]);
    let unscoped = store
        .list_pending(
            &IdentityKey {
                issuer: None,
                subject: "alice".to_string(),
            },
            Timestamp::from_unix_millis(3_000),
        )
        .unwrap();
    assert_eq!(unscoped.len(), 1);
    assert_eq!(unscoped[0].token_digest, anonymous_issuer.token_digest);
}

// ============================================================================
// SECTION: Tamper Detection
// ============================================================================

#[test]
fn sqlite_store_fails_closed_on_unknown_status() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let original = record("alice", 1_000, 60_000);
    store.insert(&original).unwrap();
    {
        let connection = Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE confirmations SET status = 'granted' WHERE token_digest = ?1",
                params![original.token_digest],
            )
            .unwrap();
    }
    let err = store.load(&original.token_digest).expect_err("corrupt");
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn sqlite_store_fails_closed_on_malformed_arguments() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let original = record("alice", 1_000, 60_000);
    store.insert(&original).unwrap();
    {
        let connection = Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE confirmations SET arguments_json = '[1, 2' WHERE token_digest = ?1",
                params![original.token_digest],
            )
            .unwrap();
    }
    let err = store.load(&original.token_digest).expect_err("corrupt");
    assert!(matches!(err, StoreError::Corrupt(_)));
}
