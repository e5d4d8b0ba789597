// crates/consent-gate-core/src/runtime/gateway.rs
// ============================================================================
// Module: Consent Gate Gateway
// Description: Per-request composition of origin, auth, registry, and broker.
// Purpose: Enforce one fail-closed pipeline for every capability invocation.
// Dependencies: crate::{core, interfaces, runtime}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each invocation passes through, in order:
//! 1. the origin filter (no token parsing for rejected origins);
//! 2. token verification;
//! 3. capability resolution and argument validation;
//! 4. the confirmation policy: direct invocation, or a pending confirmation.
//!
//! Authentication failures never reach a handler and keep their specific
//! kind. Handler failures are wrapped as
//! [`GatewayError::CapabilityExecutionFailed`].
//!
//! Security posture: every request is untrusted until both the origin and
//! token checks pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::CapabilityArguments;
use crate::core::CapabilityKind;
use crate::core::ConfirmationDecision;
use crate::core::ConfirmationSummary;
use crate::core::ConfirmationToken;
use crate::core::Identity;
use crate::core::Timestamp;
use crate::interfaces::AuthError;
use crate::interfaces::TokenVerifier;
use crate::runtime::broker::BrokerError;
use crate::runtime::broker::ConfirmationBroker;
use crate::runtime::broker::ConfirmationOutcome;
use crate::runtime::broker::invoke_guarded;
use crate::runtime::origin::OriginFilter;
use crate::runtime::registry::CapabilityRegistry;
use crate::runtime::registry::RegisteredCapability;
use crate::runtime::registry::RegistryError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Inbound capability invocation.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Capability name, or resource URI.
    pub name: String,
    /// Caller arguments.
    pub arguments: CapabilityArguments,
    /// Raw bearer token, if presented.
    pub raw_token: Option<String>,
    /// Resolved client address, if known.
    pub remote_addr: Option<IpAddr>,
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// Capability ran; carries its result.
    Completed {
        /// Capability result.
        result: Value,
    },
    /// Capability requires confirmation; resolve the token to run it.
    ConfirmationPending {
        /// Confirmation token.
        token: ConfirmationToken,
        /// Deadline for resolution.
        expires_at: Timestamp,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway errors, one variant per caller-visible failure kind.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Caller address is outside the allowlist.
    #[error("origin denied")]
    OriginDenied,
    /// Token verification failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Capability or resource is unknown.
    #[error("not found: {0}")]
    NotFound(String),
    /// Arguments failed schema validation.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// Capability name conflicts at registration.
    #[error("duplicate capability: {0}")]
    DuplicateCapability(String),
    /// Resource template overlaps at registration.
    #[error("ambiguous template: {0}")]
    AmbiguousTemplate(String),
    /// Descriptor or schema rejected at registration.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
    /// Confirmation token does not match a record.
    #[error("unknown confirmation")]
    UnknownConfirmation,
    /// Confirmation already approved or denied.
    #[error("confirmation already resolved")]
    AlreadyResolved,
    /// Confirmation belongs to a different identity.
    #[error("identity mismatch")]
    IdentityMismatch,
    /// Confirmation expired before resolution.
    #[error("confirmation expired")]
    ConfirmationExpired,
    /// Handler failed or panicked.
    #[error("capability execution failed: {0}")]
    CapabilityExecutionFailed(String),
    /// Confirmation store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl GatewayError {
    /// Returns the stable error kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OriginDenied => "origin_denied",
            Self::Auth(err) => err.code(),
            Self::NotFound(_) => "not_found",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::DuplicateCapability(_) => "duplicate_capability",
            Self::AmbiguousTemplate(_) => "ambiguous_template",
            Self::InvalidRegistration(_) => "invalid_registration",
            Self::UnknownConfirmation => "unknown_confirmation",
            Self::AlreadyResolved => "already_resolved",
            Self::IdentityMismatch => "identity_mismatch",
            Self::ConfirmationExpired => "confirmation_expired",
            Self::CapabilityExecutionFailed(_) => "capability_execution_failed",
            Self::Store(_) => "store_error",
        }
    }

    /// Returns true for origin and token failures.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::OriginDenied | Self::Auth(_))
    }
}

impl From<RegistryError> for GatewayError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Duplicate {
                ..
            } => Self::DuplicateCapability(error.to_string()),
            RegistryError::AmbiguousTemplate {
                ..
            } => Self::AmbiguousTemplate(error.to_string()),
            RegistryError::InvalidDescriptor {
                ..
            }
            | RegistryError::InvalidSchema {
                ..
            } => Self::InvalidRegistration(error.to_string()),
            RegistryError::NotFound {
                name,
                ..
            } => Self::NotFound(name),
            RegistryError::InvalidArguments {
                error,
                ..
            } => Self::InvalidArguments(error),
        }
    }
}

impl From<BrokerError> for GatewayError {
    fn from(error: BrokerError) -> Self {
        match error {
            BrokerError::UnknownConfirmation => Self::UnknownConfirmation,
            BrokerError::AlreadyResolved(_) => Self::AlreadyResolved,
            BrokerError::IdentityMismatch => Self::IdentityMismatch,
            BrokerError::ConfirmationExpired => Self::ConfirmationExpired,
            BrokerError::CapabilityExecutionFailed(message) => {
                Self::CapabilityExecutionFailed(message)
            }
            BrokerError::Store(err) => Self::Store(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Request-authorization gateway.
#[derive(Clone)]
pub struct Gateway {
    /// Network origin filter.
    origin: OriginFilter,
    /// Bearer token verifier.
    verifier: Arc<dyn TokenVerifier>,
    /// Capability registry.
    registry: Arc<CapabilityRegistry>,
    /// Confirmation broker.
    broker: ConfirmationBroker,
}

impl Gateway {
    /// Composes a gateway from its components.
    #[must_use]
    pub fn new(
        origin: OriginFilter,
        verifier: Arc<dyn TokenVerifier>,
        registry: Arc<CapabilityRegistry>,
        broker: ConfirmationBroker,
    ) -> Self {
        Self {
            origin,
            verifier,
            registry,
            broker,
        }
    }

    /// Returns the capability registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Returns the confirmation broker.
    #[must_use]
    pub const fn broker(&self) -> &ConfirmationBroker {
        &self.broker
    }

    /// Applies the origin filter, then verifies the token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::OriginDenied`] or [`GatewayError::Auth`].
    pub fn authenticate(
        &self,
        remote_addr: Option<IpAddr>,
        raw_token: Option<&str>,
    ) -> Result<Identity, GatewayError> {
        if !self.origin.is_allowed(remote_addr) {
            return Err(GatewayError::OriginDenied);
        }
        let token = raw_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::MalformedToken("missing bearer token".to_string()))?;
        Ok(self.verifier.verify(token)?)
    }

    /// Authenticates and invokes a capability.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for the first failed pipeline stage.
    pub fn invoke(&self, request: InvocationRequest) -> Result<InvocationOutcome, GatewayError> {
        let identity = self.authenticate(request.remote_addr, request.raw_token.as_deref())?;
        self.invoke_as(&identity, request.kind, &request.name, request.arguments)
    }

    /// Invokes a capability for an already authenticated identity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when resolution, validation, confirmation, or
    /// execution fails.
    pub fn invoke_as(
        &self,
        identity: &Identity,
        kind: CapabilityKind,
        name: &str,
        arguments: CapabilityArguments,
    ) -> Result<InvocationOutcome, GatewayError> {
        let resolved = self.registry.resolve(kind, name)?;
        let arguments = resolved.merge_arguments(arguments);
        resolved.capability.validate_arguments(&arguments)?;
        if !resolved.capability.requires_permission() {
            let result = invoke_guarded(&resolved.capability, &arguments)?;
            return Ok(InvocationOutcome::Completed {
                result,
            });
        }
        let ticket = self.broker.request_confirmation(&resolved.capability, arguments, identity)?;
        Ok(InvocationOutcome::ConfirmationPending {
            token: ticket.token,
            expires_at: ticket.expires_at,
        })
    }

    /// Authenticates and resolves a pending confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for auth or broker failures.
    pub fn resolve_confirmation(
        &self,
        remote_addr: Option<IpAddr>,
        raw_token: Option<&str>,
        token: &ConfirmationToken,
        decision: ConfirmationDecision,
    ) -> Result<ConfirmationOutcome, GatewayError> {
        let identity = self.authenticate(remote_addr, raw_token)?;
        self.resolve_as(&identity, token, decision)
    }

    /// Resolves a pending confirmation for an authenticated identity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for broker failures.
    pub fn resolve_as(
        &self,
        identity: &Identity,
        token: &ConfirmationToken,
        decision: ConfirmationDecision,
    ) -> Result<ConfirmationOutcome, GatewayError> {
        Ok(self.broker.resolve(token, decision, identity)?)
    }

    /// Lists capabilities of a kind in registration order. Callers
    /// authenticate first.
    #[must_use]
    pub fn list(&self, kind: CapabilityKind) -> Vec<Arc<RegisteredCapability>> {
        self.registry.list_all(kind)
    }

    /// Authenticates and lists the caller's outstanding confirmations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for auth or store failures.
    pub fn pending_confirmations(
        &self,
        remote_addr: Option<IpAddr>,
        raw_token: Option<&str>,
    ) -> Result<Vec<ConfirmationSummary>, GatewayError> {
        let identity = self.authenticate(remote_addr, raw_token)?;
        self.pending_as(&identity)
    }

    /// Lists the identity's outstanding confirmations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] when loading fails.
    pub fn pending_as(&self, identity: &Identity) -> Result<Vec<ConfirmationSummary>, GatewayError> {
        Ok(self.broker.pending_for(identity)?)
    }
}
