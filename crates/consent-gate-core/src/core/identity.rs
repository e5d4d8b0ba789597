// crates/consent-gate-core/src/core/identity.rs
// ============================================================================
// Module: Consent Gate Identity
// Description: Verified caller claims extracted from bearer tokens.
// Purpose: Carry per-request identity and the key used to scope confirmations.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Identity`] is produced only by a [`crate::interfaces::TokenVerifier`]
//! after every token check passes. It is immutable and lives for a single
//! request. Confirmations are scoped to the requester through
//! [`IdentityKey`], the issuer and subject pair.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    /// Subject identifier (`sub`).
    pub subject: String,
    /// Issuer (`iss`) when present.
    pub issuer: Option<String>,
    /// Audience entries (`aud`), normalized to a list.
    pub audience: Vec<String>,
    /// Expiry (`exp`) when present.
    pub expires_at: Option<Timestamp>,
    /// Issue time (`iat`) when present.
    pub issued_at: Option<Timestamp>,
    /// Not-before time (`nbf`) when present.
    pub not_before: Option<Timestamp>,
    /// Remaining claims not mapped to a named field.
    pub claims: BTreeMap<String, Value>,
    /// SHA-256 fingerprint of the raw token, for audit correlation.
    pub token_fingerprint: String,
}

impl Identity {
    /// Returns the key used to compare requesters.
    #[must_use]
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            issuer: self.issuer.clone(),
            subject: self.subject.clone(),
        }
    }
}

/// Issuer and subject pair identifying a requester across requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    /// Token issuer, when the token carried one.
    pub issuer: Option<String>,
    /// Token subject.
    pub subject: String,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issuer {
            Some(issuer) => write!(f, "{issuer}#{}", self.subject),
            None => self.subject.fmt(f),
        }
    }
}
