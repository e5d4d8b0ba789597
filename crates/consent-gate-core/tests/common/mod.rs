// crates/consent-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared verifiers, identities, and gateway builders for core tests.
// Purpose: Provide reusable test infrastructure for deterministic testing.
// Dependencies: consent-gate-core
// ============================================================================

//! ## Overview
//! Fixtures build a gateway with a table-driven token verifier and a manual
//! clock so pipeline tests never depend on real cryptography or wall time.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use consent_gate_core::AuthError;
use consent_gate_core::CapabilityDescriptor;
use consent_gate_core::CapabilityRegistry;
use consent_gate_core::ConfirmationBroker;
use consent_gate_core::Gateway;
use consent_gate_core::Identity;
use consent_gate_core::InMemoryConfirmationStore;
use consent_gate_core::ManualClock;
use consent_gate_core::OriginFilter;
use consent_gate_core::SharedConfirmationStore;
use consent_gate_core::Timestamp;
use consent_gate_core::TokenVerifier;
use consent_gate_core::capability_fn;
use serde_json::json;

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifier that maps fixed token strings to outcomes and counts calls.
#[derive(Default)]
pub struct TableVerifier {
    /// Token outcomes.
    pub outcomes: BTreeMap<String, Result<Identity, AuthError>>,
    /// Number of verify calls.
    pub calls: AtomicUsize,
}

impl TableVerifier {
    /// Adds a token that verifies as `subject`.
    #[must_use]
    pub fn with_subject(mut self, token: &str, subject: &str) -> Self {
        self.outcomes.insert(token.to_string(), Ok(identity(subject)));
        self
    }

    /// Adds a token that fails with `error`.
    #[must_use]
    pub fn with_error(mut self, token: &str, error: AuthError) -> Self {
        self.outcomes.insert(token.to_string(), Err(error));
        self
    }
}

impl TokenVerifier for TableVerifier {
    fn verify(&self, raw_token: &str) -> Result<Identity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .get(raw_token)
            .cloned()
            .unwrap_or_else(|| Err(AuthError::InvalidSignature))
    }
}

/// Builds an identity for a subject.
#[must_use]
pub fn identity(subject: &str) -> Identity {
    Identity {
        subject: subject.to_string(),
        issuer: Some("https://issuer.test".to_string()),
        audience: vec!["consent-gate".to_string()],
        expires_at: None,
        issued_at: None,
        not_before: None,
        claims: BTreeMap::new(),
        token_fingerprint: format!("fingerprint-{subject}"),
    }
}

// ============================================================================
// SECTION: Gateway Fixture
// ============================================================================

/// Gateway plus handles used by assertions.
pub struct GatewayFixture {
    /// Gateway under test.
    pub gateway: Gateway,
    /// Verifier shared with the gateway.
    pub verifier: Arc<TableVerifier>,
    /// Manual clock shared with the broker.
    pub clock: Arc<ManualClock>,
    /// Count of `sendEmail` executions.
    pub email_calls: Arc<AtomicUsize>,
}

/// Builds a gateway with `sendEmail` (confirmation required) and `add`
/// (no confirmation), plus an open and a gated templated resource.
#[must_use]
pub fn gateway_fixture(allowlist: &[&str], ttl_seconds: u64) -> GatewayFixture {
    let email_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&email_calls);
    let mut registry = CapabilityRegistry::default();
    registry
        .register(
            CapabilityDescriptor::tool(
                "sendEmail",
                capability_fn(move |args| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"delivered": args.get("to").cloned()}))
                }),
            )
            .requires_permission(true),
        )
        .unwrap();
    registry
        .register(
            CapabilityDescriptor::tool(
                "add",
                capability_fn(|args| {
                    let a = args.get("a").and_then(serde_json::Value::as_f64).unwrap_or_default();
                    let b = args.get("b").and_then(serde_json::Value::as_f64).unwrap_or_default();
                    Ok(json!(a + b))
                }),
            )
            .requires_permission(false)
            .with_input_schema(json!({
                "type": "object",
                "required": ["a", "b"],
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}}
            })),
        )
        .unwrap();
    registry
        .register(CapabilityDescriptor::resource_template(
            "current_weather",
            "weather://{city}/current",
            capability_fn(|args| Ok(json!({"city": args.get("city").cloned(), "temperature": 20}))),
        ))
        .unwrap();
    registry
        .register(
            CapabilityDescriptor::resource_template(
                "forecast",
                "forecast://{city}/tomorrow",
                capability_fn(|args| Ok(json!({"city": args.get("city").cloned()}))),
            )
            .requires_permission(true),
        )
        .unwrap();
    let registry = Arc::new(registry);
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_seconds(1_700_000_000)));
    let broker = ConfirmationBroker::new(
        SharedConfirmationStore::from_store(InMemoryConfirmationStore::new()),
        Arc::clone(&registry),
        clock.clone(),
    )
    .with_ttl_seconds(ttl_seconds);
    let verifier = Arc::new(
        TableVerifier::default()
            .with_subject("alice-token", "alice")
            .with_subject("bob-token", "bob")
            .with_error("expired-token", AuthError::Expired)
            .with_error("future-token", AuthError::NotYetValid),
    );
    let origin = OriginFilter::parse(allowlist).unwrap();
    let gateway = Gateway::new(origin, verifier.clone(), registry, broker);
    GatewayFixture {
        gateway,
        verifier,
        clock,
        email_calls,
    }
}
