// crates/consent-gate-core/src/core/mod.rs
// ============================================================================
// Module: Consent Gate Core Types
// Description: Canonical identity, capability, and confirmation structures.
// Purpose: Provide stable, serializable types shared by every gateway layer.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Core types describe who is calling (identity), what can be called
//! (capability descriptors and URI templates), where calls may come from
//! (allowlist entries), and the persisted state of consent requests. These
//! types are the canonical source of truth for the MCP surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod allowlist;
pub mod capability;
pub mod confirmation;
pub mod hashing;
pub mod identifiers;
pub mod identity;
pub mod template;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use allowlist::AllowlistEntry;
pub use allowlist::AllowlistError;
pub use allowlist::canonical_ip;
pub use capability::CapabilityArguments;
pub use capability::CapabilityDescriptor;
pub use capability::CapabilityKind;
pub use capability::PermissionPolicy;
pub use capability::ResourceLocator;
pub use confirmation::ConfirmationDecision;
pub use confirmation::ConfirmationStatus;
pub use confirmation::ConfirmationSummary;
pub use confirmation::PendingConfirmation;
pub use hashing::sha256_hex;
pub use identifiers::CapabilityName;
pub use identifiers::ConfirmationToken;
pub use identity::Identity;
pub use identity::IdentityKey;
pub use template::MAX_MATCH_URI_LENGTH;
pub use template::TemplateError;
pub use template::UriTemplate;
pub use time::Timestamp;
