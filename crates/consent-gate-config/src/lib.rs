// crates/consent-gate-config/src/lib.rs
// ============================================================================
// Module: Consent Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for consent-gate.toml semantics.
// Dependencies: consent-gate-core, consent-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `consent-gate-config` defines the configuration model for the Consent Gate
//! server. It provides strict, fail-closed validation and a canonical example
//! file.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
