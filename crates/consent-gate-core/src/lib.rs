// crates/consent-gate-core/src/lib.rs
// ============================================================================
// Module: Consent Gate Core Library
// Description: Public API surface for the Consent Gate core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Consent Gate core authorizes capability invocations coming from an
//! AI-assistant client. Every call passes an origin allowlist and bearer token
//! verification before the capability registry is consulted; capabilities that
//! require user consent are parked with the confirmation broker until the
//! caller explicitly approves or denies them.
//!
//! The core is transport-agnostic and synchronous. Hosts supply the token
//! verifier, clock, and confirmation store through [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::AuthError;
pub use interfaces::CapabilityHandler;
pub use interfaces::Clock;
pub use interfaces::ConfirmationStore;
pub use interfaces::HandlerError;
pub use interfaces::StoreError;
pub use interfaces::TokenVerifier;
pub use interfaces::capability_fn;
pub use runtime::BrokerError;
pub use runtime::CapabilityRegistry;
pub use runtime::ConfirmationBroker;
pub use runtime::ConfirmationOutcome;
pub use runtime::ConfirmationTicket;
pub use runtime::DEFAULT_CONFIRMATION_TTL_SECONDS;
pub use runtime::Gateway;
pub use runtime::GatewayError;
pub use runtime::InMemoryConfirmationStore;
pub use runtime::InvocationOutcome;
pub use runtime::InvocationRequest;
pub use runtime::ManualClock;
pub use runtime::OriginFilter;
pub use runtime::PermissionDefaults;
pub use runtime::RegisteredCapability;
pub use runtime::RegistryError;
pub use runtime::ResolvedCapability;
pub use runtime::SharedConfirmationStore;
pub use runtime::SystemClock;
