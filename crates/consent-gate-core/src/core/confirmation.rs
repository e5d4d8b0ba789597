// crates/consent-gate-core/src/core/confirmation.rs
// ============================================================================
// Module: Consent Gate Confirmation Records
// Description: Persisted state for capability invocations awaiting consent.
// Purpose: Define the confirmation state machine and its stored record.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`PendingConfirmation`] is created when a confirmation-required
//! capability is invoked. It moves from `Pending` to exactly one terminal
//! state (`Approved`, `Denied`, `Expired`) and never leaves it. Records are
//! keyed by the SHA-256 digest of the confirmation token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::capability::CapabilityArguments;
use crate::core::capability::CapabilityKind;
use crate::core::identifiers::CapabilityName;
use crate::core::identity::IdentityKey;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of the digest prefix exposed as a public reference.
const REFERENCE_LENGTH: usize = 12;

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Confirmation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// Awaiting an explicit decision.
    Pending,
    /// Approved; the handler was invoked.
    Approved,
    /// Denied; the handler was not invoked.
    Denied,
    /// TTL elapsed before a decision.
    Expired,
}

impl ConfirmationStatus {
    /// Returns a stable label for this status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
        }
    }

    /// Parses a stable status label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Returns true for `Approved`, `Denied`, and `Expired`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller decision for a pending confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationDecision {
    /// Run the capability with the stored arguments.
    Approve,
    /// Discard the request without running it.
    Deny,
}

impl ConfirmationDecision {
    /// Returns the terminal status this decision produces.
    #[must_use]
    pub const fn target_status(self) -> ConfirmationStatus {
        match self {
            Self::Approve => ConfirmationStatus::Approved,
            Self::Deny => ConfirmationStatus::Denied,
        }
    }

    /// Returns a stable label for this decision.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
        }
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Stored confirmation record.
///
/// # Invariants
/// - `token_digest` is the SHA-256 hex digest of the issued token.
/// - `resolved_at` is set exactly when `status` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// SHA-256 hex digest of the confirmation token.
    pub token_digest: String,
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Capability name.
    pub capability: CapabilityName,
    /// Arguments captured at request time.
    pub arguments: CapabilityArguments,
    /// Identity that requested the invocation.
    pub requester: IdentityKey,
    /// Creation time.
    pub created_at: Timestamp,
    /// Time after which a pending record is expired.
    pub expires_at: Timestamp,
    /// Current lifecycle state.
    pub status: ConfirmationStatus,
    /// Time the record reached a terminal state.
    pub resolved_at: Option<Timestamp>,
}

impl PendingConfirmation {
    /// Returns true when the record is still pending and `now` is past its
    /// deadline. A record is still resolvable at exactly `expires_at`.
    #[must_use]
    pub fn is_lapsed(&self, now: Timestamp) -> bool {
        self.status == ConfirmationStatus::Pending && now > self.expires_at
    }

    /// Returns a client-safe summary of this record.
    #[must_use]
    pub fn summary(&self) -> ConfirmationSummary {
        ConfirmationSummary {
            reference: self.token_digest.chars().take(REFERENCE_LENGTH).collect(),
            kind: self.kind,
            capability: self.capability.clone(),
            arguments: self.arguments.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Client-visible view of a pending confirmation (never includes the token).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationSummary {
    /// Short digest prefix usable for display and log correlation.
    pub reference: String,
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Capability name.
    pub capability: CapabilityName,
    /// Stored arguments.
    pub arguments: CapabilityArguments,
    /// Creation time (unix millis).
    pub created_at: Timestamp,
    /// Expiry time (unix millis).
    pub expires_at: Timestamp,
}
