// crates/consent-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Consent Gate Runtime
// Description: Registry, confirmation broker, origin filter, and gateway pipeline.
// Purpose: Compose the core checks applied to every capability invocation.
// Dependencies: crate::{core, interfaces}, jsonschema
// ============================================================================

//! ## Overview
//! Runtime modules implement the request pipeline: origin filter, token
//! verification, capability resolution, and either direct invocation or the
//! two-step confirmation protocol. All transports must call into
//! [`Gateway`] so every surface enforces the same policy.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod broker;
pub mod clock;
pub mod gateway;
pub mod origin;
pub mod registry;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::BrokerError;
pub use broker::ConfirmationBroker;
pub use broker::ConfirmationOutcome;
pub use broker::ConfirmationTicket;
pub use broker::DEFAULT_CONFIRMATION_TTL_SECONDS;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use gateway::Gateway;
pub use gateway::GatewayError;
pub use gateway::InvocationOutcome;
pub use gateway::InvocationRequest;
pub use origin::OriginFilter;
pub use registry::CapabilityRegistry;
pub use registry::PermissionDefaults;
pub use registry::RegisteredCapability;
pub use registry::RegistryError;
pub use registry::ResolvedCapability;
pub use store::InMemoryConfirmationStore;
pub use store::SharedConfirmationStore;
