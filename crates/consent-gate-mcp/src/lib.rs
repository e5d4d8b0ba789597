// crates/consent-gate-mcp/src/lib.rs
// ============================================================================
// Module: Consent Gate MCP
// Description: MCP HTTP surface for the Consent Gate authorization core.
// Purpose: Serve capability calls and confirmation round trips over JSON-RPC.
// Dependencies: consent-gate-core, consent-gate-config, axum, tokio
// ============================================================================

//! ## Overview
//! Consent Gate MCP exposes the gateway through a JSON-RPC 2.0 endpoint. The
//! server resolves the client address, hands the bearer token to the
//! [`consent_gate_core::Gateway`], and renders pending confirmations as tokens
//! the client resolves with `confirmations/resolve`. Token verification, the
//! demo capability catalog, and structured audit events live here as well.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod router;
pub mod server;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::ConfirmationAuditEvent;
pub use audit::FileAuditSink;
pub use audit::GatewayAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::SweepAuditEvent;
pub use auth::HttpKeyFetcher;
pub use auth::JwtTokenVerifier;
pub use auth::KeyFetcher;
pub use auth::KeySource;
pub use auth::RequestContext;
pub use auth::TokenClaims;
pub use auth::issue_token;
pub use auth::parse_bearer_token;
pub use catalog::CatalogError;
pub use catalog::build_registry;
pub use catalog::demo_catalog;
pub use router::GatewayRouter;
pub use server::McpServer;
pub use server::McpServerError;
