// crates/consent-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Consent Gate Identifiers
// Description: Opaque identifiers for capabilities and confirmation tokens.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: base64, rand, serde
// ============================================================================

//! ## Overview
//! Capability names are opaque strings unique within their kind. Confirmation
//! tokens are bearer secrets minted from the operating system CSPRNG; only
//! their digest is ever persisted.
//!
//! Security posture: confirmation tokens carry 256 bits of entropy so that a
//! caller cannot guess another caller's pending confirmation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::sha256_hex;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of random bytes in a confirmation token.
pub const CONFIRMATION_TOKEN_BYTES: usize = 32;

// ============================================================================
// SECTION: Capability Name
// ============================================================================

/// Capability name unique within its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityName(String);

impl CapabilityName {
    /// Creates a new capability name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CapabilityName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CapabilityName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Confirmation Token
// ============================================================================

/// Opaque confirmation token handed to the requesting client.
///
/// # Invariants
/// - Generated tokens are 32 CSPRNG bytes encoded as unpadded base64url.
/// - The token value is never stored; see [`ConfirmationToken::digest`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationToken(String);

impl ConfirmationToken {
    /// Mints a fresh random confirmation token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; CONFIRMATION_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wraps a token value presented by a client.
    #[must_use]
    pub fn from_presented(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the storage key for this token (SHA-256 hex).
    #[must_use]
    pub fn digest(&self) -> String {
        sha256_hex(self.0.as_bytes())
    }
}

impl fmt::Debug for ConfirmationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfirmationToken(<redacted>)")
    }
}
