// crates/consent-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Confirmation Store
// Description: Durable ConfirmationStore backend using SQLite.
// Purpose: Keep pending confirmations across gateway restarts.
// Dependencies: consent-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`ConfirmationStore`] implementation.
//! Records are keyed by the SHA-256 digest of the confirmation token, so the
//! database never holds a usable token. Security posture: database contents
//! are untrusted and are validated on every load.
//!
//! [`ConfirmationStore`]: consent_gate_core::ConfirmationStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteConfirmationStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
