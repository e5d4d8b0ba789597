// crates/consent-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Consent Gate Interfaces
// Description: Backend-agnostic traits for handlers, verifiers, stores, and clocks.
// Purpose: Define the seams hosts implement to plug the gateway into a deployment.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Interfaces keep the core free of transport, cryptography, and storage
//! choices. Token verification, confirmation persistence, and time are all
//! injected. Implementations must be thread-safe: the gateway is shared
//! across concurrent requests.
//!
//! Security posture: verifiers and stores sit on trust boundaries and must
//! fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::CapabilityArguments;
use crate::core::ConfirmationStatus;
use crate::core::Identity;
use crate::core::IdentityKey;
use crate::core::PendingConfirmation;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Capability Handlers
// ============================================================================

/// Capability handler failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Arguments were structurally valid but semantically unusable.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The capability body failed.
    #[error("capability failed: {0}")]
    Failed(String),
}

/// Invocation handler for a capability.
pub trait CapabilityHandler: Send + Sync {
    /// Runs the capability with the provided arguments.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the capability cannot produce a result.
    fn invoke(&self, arguments: &CapabilityArguments) -> Result<Value, HandlerError>;
}

impl<F> CapabilityHandler for F
where
    F: Fn(&CapabilityArguments) -> Result<Value, HandlerError> + Send + Sync,
{
    fn invoke(&self, arguments: &CapabilityArguments) -> Result<Value, HandlerError> {
        self(arguments)
    }
}

/// Pins a closure to the handler signature so argument and error types infer.
pub const fn capability_fn<F>(handler: F) -> F
where
    F: Fn(&CapabilityArguments) -> Result<Value, HandlerError> + Send + Sync,
{
    handler
}

// ============================================================================
// SECTION: Token Verification
// ============================================================================

/// Token verification failures.
///
/// # Invariants
/// - Variants are stable for audit labeling; see [`AuthError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token is missing or not a well-formed signed token.
    #[error("malformed token: {0}")]
    MalformedToken(String),
    /// Signature does not verify against the configured key.
    #[error("invalid token signature")]
    InvalidSignature,
    /// Issuer or audience differs from the configured expectation.
    #[error("token claim mismatch: {0}")]
    ClaimMismatch(String),
    /// Token expiry is in the past.
    #[error("token expired")]
    Expired,
    /// Token issue or not-before time is in the future.
    #[error("token not yet valid")]
    NotYetValid,
    /// Verification key could not be obtained.
    #[error("verification key unavailable: {0}")]
    KeyUnavailable(String),
}

impl AuthError {
    /// Returns a stable error label.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::ClaimMismatch(_) => "claim_mismatch",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::KeyUnavailable(_) => "key_unavailable",
        }
    }
}

/// Bearer token verifier.
pub trait TokenVerifier: Send + Sync {
    /// Verifies a raw bearer token and returns the caller identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] describing the first failed check.
    fn verify(&self, raw_token: &str) -> Result<Identity, AuthError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Confirmation Store
// ============================================================================

/// Confirmation store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("confirmation store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("confirmation store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("confirmation store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("confirmation store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("confirmation store error: {0}")]
    Store(String),
}

/// Persistence for confirmation records.
///
/// # Invariants
/// - [`ConfirmationStore::transition`] is atomic: for a given record, at most
///   one caller ever observes `true`.
pub trait ConfirmationStore: Send + Sync {
    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the digest already exists or the write fails.
    fn insert(&self, record: &PendingConfirmation) -> Result<(), StoreError>;

    /// Loads a record by token digest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load(&self, token_digest: &str) -> Result<Option<PendingConfirmation>, StoreError>;

    /// Moves a `Pending` record to `status`. Returns `false` when the record is
    /// missing or no longer pending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn transition(
        &self,
        token_digest: &str,
        status: ConfirmationStatus,
        at: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Marks every pending record with `expires_at < now` as expired.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn expire_pending(&self, now: Timestamp) -> Result<usize, StoreError>;

    /// Deletes terminal records resolved before `resolved_before`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn purge_resolved(&self, resolved_before: Timestamp) -> Result<usize, StoreError>;

    /// Lists pending, unexpired records for a requester, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn list_pending(
        &self,
        requester: &IdentityKey,
        now: Timestamp,
    ) -> Result<Vec<PendingConfirmation>, StoreError>;
}
