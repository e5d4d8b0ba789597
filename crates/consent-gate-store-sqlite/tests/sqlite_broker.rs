// crates/consent-gate-store-sqlite/tests/sqlite_broker.rs
// ============================================================================
// Module: SQLite Broker Integration Tests
// Description: Runs the confirmation broker over the SQLite store.
// Purpose: Validate that confirmations survive a store reopen.
// ============================================================================

//! ## Overview
//! A confirmation requested through one store handle must be resolvable
//! through a fresh handle opened on the same database file.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use consent_gate_core::CapabilityDescriptor;
use consent_gate_core::CapabilityKind;
use consent_gate_core::CapabilityRegistry;
use consent_gate_core::ConfirmationBroker;
use consent_gate_core::ConfirmationDecision;
use consent_gate_core::ConfirmationOutcome;
use consent_gate_core::Identity;
use consent_gate_core::ManualClock;
use consent_gate_core::SharedConfirmationStore;
use consent_gate_core::Timestamp;
use consent_gate_core::capability_fn;
use consent_gate_store_sqlite::SqliteConfirmationStore;
use consent_gate_store_sqlite::SqliteStoreConfig;
use serde_json::Map;
use serde_json::json;
use tempfile::TempDir;

fn alice() -> Identity {
    Identity {
        subject: "alice".to_string(),
        issuer: None,
        audience: Vec::new(),
        expires_at: None,
        issued_at: None,
        not_before: None,
        claims: BTreeMap::new(),
        token_fingerprint: "fp-alice".to_string(),
    }
}

#[test]
fn confirmation_survives_store_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("confirmations.db");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = CapabilityRegistry::default();
    registry
        .register(CapabilityDescriptor::tool(
            "sendEmail",
            capability_fn(move |args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"sent": args.get("to").cloned()}))
            }),
        ))
        .unwrap();
    let registry = Arc::new(registry);
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_seconds(1_700_000_000)));
    let broker_for = |store: SqliteConfirmationStore| {
        ConfirmationBroker::new(
            SharedConfirmationStore::from_store(store),
            Arc::clone(&registry),
            clock.clone(),
        )
    };

    let first = broker_for(SqliteConfirmationStore::new(SqliteStoreConfig::for_path(&path)).unwrap());
    let resolved = registry.resolve(CapabilityKind::Tool, "sendEmail").unwrap();
    let mut args = Map::new();
    args.insert("to".to_string(), json!("bob@example.com"));
    let ticket = first.request_confirmation(&resolved.capability, args, &alice()).unwrap();
    drop(first);

    let second = broker_for(SqliteConfirmationStore::new(SqliteStoreConfig::for_path(&path)).unwrap());
    assert_eq!(second.pending_for(&alice()).unwrap().len(), 1);
    let outcome = second.resolve(&ticket.token, ConfirmationDecision::Approve, &alice()).unwrap();
    assert_eq!(
        outcome,
        ConfirmationOutcome::Approved {
            result: json!({"sent": "bob@example.com"}),
        }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let err = second
        .resolve(&ticket.token, ConfirmationDecision::Deny, &alice())
        .expect_err("already resolved");
    assert_eq!(err.code(), "already_resolved");
}
