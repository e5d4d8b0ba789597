// crates/consent-gate-core/src/runtime/broker.rs
// ============================================================================
// Module: Consent Gate Confirmation Broker
// Description: Two-step request/resolve protocol for confirmation-required capabilities.
// Purpose: Own pending confirmation records and their state transitions.
// Dependencies: crate::{core, interfaces, runtime::registry}, serde_json
// ============================================================================

//! ## Overview
//! The broker is the only component that mutates confirmation records.
//! `request_confirmation` mints an unguessable token and stores a `Pending`
//! record keyed by the token digest. `resolve` applies an explicit decision:
//! - approval runs the handler once with the stored arguments;
//! - denial discards the request;
//! - a record past its TTL becomes `Expired` and can no longer be resolved.
//!
//! Concurrent resolves race on [`ConfirmationStore::transition`]; exactly one
//! caller wins and every other caller observes
//! [`BrokerError::AlreadyResolved`].
//!
//! Security posture: confirmations are scoped to the requesting identity
//! unless cross-identity approval is explicitly enabled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::CapabilityArguments;
use crate::core::ConfirmationDecision;
use crate::core::ConfirmationStatus;
use crate::core::ConfirmationSummary;
use crate::core::ConfirmationToken;
use crate::core::Identity;
use crate::core::PendingConfirmation;
use crate::core::Timestamp;
use crate::interfaces::Clock;
use crate::interfaces::ConfirmationStore;
use crate::interfaces::HandlerError;
use crate::interfaces::StoreError;
use crate::runtime::registry::CapabilityRegistry;
use crate::runtime::registry::RegisteredCapability;
use crate::runtime::store::SharedConfirmationStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default confirmation TTL (5 minutes).
pub const DEFAULT_CONFIRMATION_TTL_SECONDS: u64 = 300;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Token and deadline returned when a confirmation is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationTicket {
    /// Opaque token the client must present to resolve.
    pub token: ConfirmationToken,
    /// Time after which the request expires.
    pub expires_at: Timestamp,
}

/// Result of resolving a confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    /// Approved; carries the handler result.
    Approved {
        /// Capability result.
        result: Value,
    },
    /// Denied; the handler was not invoked.
    Denied,
}

/// Confirmation broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Token does not match any stored record.
    #[error("unknown confirmation")]
    UnknownConfirmation,
    /// Record already reached `Approved` or `Denied`.
    #[error("confirmation already resolved: {0}")]
    AlreadyResolved(ConfirmationStatus),
    /// Resolving caller differs from the requester.
    #[error("confirmation belongs to a different identity")]
    IdentityMismatch,
    /// Record expired before resolution.
    #[error("confirmation expired")]
    ConfirmationExpired,
    /// Approved handler failed; the approval stands.
    #[error("capability execution failed: {0}")]
    CapabilityExecutionFailed(String),
    /// Confirmation store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BrokerError {
    /// Returns a stable error label.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownConfirmation => "unknown_confirmation",
            Self::AlreadyResolved(_) => "already_resolved",
            Self::IdentityMismatch => "identity_mismatch",
            Self::ConfirmationExpired => "confirmation_expired",
            Self::CapabilityExecutionFailed(_) => "capability_execution_failed",
            Self::Store(_) => "store_error",
        }
    }
}

// ============================================================================
// SECTION: Broker
// ============================================================================

/// Confirmation broker.
#[derive(Clone)]
pub struct ConfirmationBroker {
    /// Record persistence.
    store: SharedConfirmationStore,
    /// Registry used to re-resolve handlers on approval.
    registry: Arc<CapabilityRegistry>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Pending record lifetime.
    ttl_seconds: u64,
    /// Whether a different identity may resolve a confirmation.
    allow_cross_identity: bool,
}

impl ConfirmationBroker {
    /// Creates a broker with the default TTL and requester-scoped resolution.
    #[must_use]
    pub fn new(
        store: SharedConfirmationStore,
        registry: Arc<CapabilityRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            ttl_seconds: DEFAULT_CONFIRMATION_TTL_SECONDS,
            allow_cross_identity: false,
        }
    }

    /// Returns a copy with the TTL set.
    #[must_use]
    pub const fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Returns a copy with cross-identity resolution enabled or disabled.
    #[must_use]
    pub const fn with_cross_identity(mut self, allow: bool) -> Self {
        self.allow_cross_identity = allow;
        self
    }

    /// Returns the configured TTL.
    #[must_use]
    pub const fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Creates a pending confirmation and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] when the record cannot be stored.
    pub fn request_confirmation(
        &self,
        capability: &RegisteredCapability,
        arguments: CapabilityArguments,
        requester: &Identity,
    ) -> Result<ConfirmationTicket, BrokerError> {
        let token = ConfirmationToken::generate();
        let created_at = self.clock.now();
        let expires_at = created_at.plus_seconds(self.ttl_seconds);
        let record = PendingConfirmation {
            token_digest: token.digest(),
            kind: capability.kind(),
            capability: capability.name().clone(),
            arguments,
            requester: requester.key(),
            created_at,
            expires_at,
            status: ConfirmationStatus::Pending,
            resolved_at: None,
        };
        self.store.insert(&record)?;
        Ok(ConfirmationTicket {
            token,
            expires_at,
        })
    }

    /// Applies a decision to a pending confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the token is unknown, owned by another
    /// identity, expired, already resolved, or when the approved handler fails.
    pub fn resolve(
        &self,
        token: &ConfirmationToken,
        decision: ConfirmationDecision,
        caller: &Identity,
    ) -> Result<ConfirmationOutcome, BrokerError> {
        let digest = token.digest();
        let now = self.clock.now();
        let record = self.store.load(&digest)?.ok_or(BrokerError::UnknownConfirmation)?;
        if !self.allow_cross_identity && record.requester != caller.key() {
            return Err(BrokerError::IdentityMismatch);
        }
        if record.is_lapsed(now) {
            self.store.transition(&digest, ConfirmationStatus::Expired, now)?;
            return Err(BrokerError::ConfirmationExpired);
        }
        match record.status {
            ConfirmationStatus::Pending => {}
            ConfirmationStatus::Expired => return Err(BrokerError::ConfirmationExpired),
            status @ (ConfirmationStatus::Approved | ConfirmationStatus::Denied) => {
                return Err(BrokerError::AlreadyResolved(status));
            }
        }
        if !self.store.transition(&digest, decision.target_status(), now)? {
            let current = self.store.load(&digest)?.map(|latest| latest.status);
            return Err(match current {
                Some(ConfirmationStatus::Expired) => BrokerError::ConfirmationExpired,
                Some(status) => BrokerError::AlreadyResolved(status),
                None => BrokerError::UnknownConfirmation,
            });
        }
        match decision {
            ConfirmationDecision::Deny => Ok(ConfirmationOutcome::Denied),
            ConfirmationDecision::Approve => {
                let capability =
                    self.registry.get(record.kind, record.capability.as_str()).ok_or_else(|| {
                        BrokerError::CapabilityExecutionFailed(format!(
                            "capability no longer registered: {}",
                            record.capability.as_str()
                        ))
                    })?;
                let result = invoke_guarded(&capability, &record.arguments)?;
                Ok(ConfirmationOutcome::Approved {
                    result,
                })
            }
        }
    }

    /// Expires every pending record past its TTL.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] when the sweep fails.
    pub fn sweep_expired(&self) -> Result<usize, BrokerError> {
        Ok(self.store.expire_pending(self.clock.now())?)
    }

    /// Deletes terminal records resolved more than `retention_seconds` ago.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] when the purge fails.
    pub fn purge_resolved(&self, retention_seconds: u64) -> Result<usize, BrokerError> {
        let cutoff = self.clock.now().minus_seconds(retention_seconds);
        Ok(self.store.purge_resolved(cutoff)?)
    }

    /// Lists the caller's outstanding confirmations.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] when loading fails.
    pub fn pending_for(&self, identity: &Identity) -> Result<Vec<ConfirmationSummary>, BrokerError> {
        let records = self.store.list_pending(&identity.key(), self.clock.now())?;
        Ok(records.iter().map(PendingConfirmation::summary).collect())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs a handler, converting errors and panics into execution failures.
pub(crate) fn invoke_guarded(
    capability: &RegisteredCapability,
    arguments: &CapabilityArguments,
) -> Result<Value, BrokerError> {
    match catch_unwind(AssertUnwindSafe(|| capability.invoke(arguments))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(HandlerError::InvalidArguments(message) | HandlerError::Failed(message))) => {
            Err(BrokerError::CapabilityExecutionFailed(message))
        }
        Err(payload) => Err(BrokerError::CapabilityExecutionFailed(panic_message(payload.as_ref()))),
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return format!("handler panicked: {message}");
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return format!("handler panicked: {message}");
    }
    "handler panicked".to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
