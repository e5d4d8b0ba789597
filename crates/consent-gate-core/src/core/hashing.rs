// crates/consent-gate-core/src/core/hashing.rs
// ============================================================================
// Module: Consent Gate Hashing
// Description: SHA-256 helpers for token fingerprints and digests.
// Purpose: Keep raw secrets out of storage and audit records.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Raw bearer tokens and confirmation tokens are never persisted or logged.
//! Stores and audit sinks only see their SHA-256 digests in lowercase hex.
//!
//! Security posture: digests are one-way; a leaked store does not allow
//! confirmation hijacking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes with SHA-256 and returns lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
