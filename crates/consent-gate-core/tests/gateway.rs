// crates/consent-gate-core/tests/gateway.rs
// ============================================================================
// Module: Gateway Pipeline Tests
// Description: End-to-end tests for the origin -> auth -> registry -> broker pipeline.
// Purpose: Validate ordering, confirmation policy, and error propagation.
// Dependencies: consent-gate-core, serde_json
// ============================================================================

//! Gateway pipeline tests covering the confirmation round trip.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use std::net::IpAddr;
use std::sync::atomic::Ordering;

use consent_gate_core::CapabilityKind;
use consent_gate_core::ConfirmationDecision;
use consent_gate_core::ConfirmationOutcome;
use consent_gate_core::GatewayError;
use consent_gate_core::InvocationOutcome;
use consent_gate_core::InvocationRequest;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::common::gateway_fixture;
use crate::common::identity;

fn addr(value: &str) -> Option<IpAddr> {
    Some(value.parse().unwrap())
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn call(kind: CapabilityKind, name: &str, arguments: Value, token: &str) -> InvocationRequest {
    InvocationRequest {
        kind,
        name: name.to_string(),
        arguments: args(arguments),
        raw_token: Some(token.to_string()),
        remote_addr: addr("10.1.2.3"),
    }
}

// ============================================================================
// SECTION: Origin and Auth Ordering
// ============================================================================

#[test]
fn origin_denied_before_token_is_parsed() {
    let fixture = gateway_fixture(&["10.0.0.0/8"], 300);
    let mut request = call(CapabilityKind::Tool, "add", json!({"a": 1, "b": 2}), "alice-token");
    request.remote_addr = addr("192.168.1.1");
    let err = fixture.gateway.invoke(request).expect_err("origin denied");
    assert_eq!(err.kind(), "origin_denied");
    assert_eq!(fixture.verifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn populated_allowlist_rejects_unknown_address() {
    let fixture = gateway_fixture(&["10.0.0.0/8"], 300);
    let mut request = call(CapabilityKind::Tool, "add", json!({"a": 1, "b": 2}), "alice-token");
    request.remote_addr = None;
    let err = fixture.gateway.invoke(request).expect_err("origin denied");
    assert!(matches!(err, GatewayError::OriginDenied));
}

#[test]
fn empty_allowlist_admits_any_address() {
    let fixture = gateway_fixture(&[], 300);
    let mut request = call(CapabilityKind::Tool, "add", json!({"a": 1, "b": 2}), "alice-token");
    request.remote_addr = addr("203.0.113.50");
    let outcome = fixture.gateway.invoke(request).unwrap();
    assert_eq!(
        outcome,
        InvocationOutcome::Completed {
            result: json!(3.0),
        }
    );
}

#[test]
fn token_errors_keep_their_specific_kind() {
    let fixture = gateway_fixture(&[], 300);
    let cases = [
        ("expired-token", "expired"),
        ("future-token", "not_yet_valid"),
        ("forged-token", "invalid_signature"),
    ];
    for (token, kind) in cases {
        let err = fixture
            .gateway
            .invoke(call(CapabilityKind::Tool, "sendEmail", json!({}), token))
            .expect_err("auth failure");
        assert_eq!(err.kind(), kind);
        assert!(err.is_auth_failure());
    }
    assert_eq!(fixture.email_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_token_is_malformed() {
    let fixture = gateway_fixture(&[], 300);
    let mut request = call(CapabilityKind::Tool, "add", json!({}), "unused");
    request.raw_token = None;
    let err = fixture.gateway.invoke(request).expect_err("missing token");
    assert_eq!(err.kind(), "malformed_token");
}

#[test]
fn auth_runs_before_registry_lookup() {
    let fixture = gateway_fixture(&[], 300);
    let err = fixture
        .gateway
        .invoke(call(CapabilityKind::Tool, "does_not_exist", json!({}), "forged-token"))
        .expect_err("auth failure first");
    assert_eq!(err.kind(), "invalid_signature");
    let err = fixture
        .gateway
        .invoke(call(CapabilityKind::Tool, "does_not_exist", json!({}), "alice-token"))
        .expect_err("not found");
    assert_eq!(err.kind(), "not_found");
}

// ============================================================================
// SECTION: Confirmation Policy
// ============================================================================

#[test]
fn capability_without_permission_never_pends() {
    let fixture = gateway_fixture(&[], 300);
    for _ in 0 .. 3 {
        let outcome = fixture
            .gateway
            .invoke(call(CapabilityKind::Tool, "add", json!({"a": 2, "b": 5}), "alice-token"))
            .unwrap();
        assert!(matches!(outcome, InvocationOutcome::Completed { .. }));
    }
}

#[test]
fn send_email_scenario_deny_then_approve() {
    let fixture = gateway_fixture(&[], 300);
    let outcome = fixture
        .gateway
        .invoke(call(CapabilityKind::Tool, "sendEmail", json!({"to": "bob"}), "alice-token"))
        .unwrap();
    let InvocationOutcome::ConfirmationPending {
        token,
        ..
    } = outcome
    else {
        panic!("expected pending confirmation");
    };
    assert_eq!(fixture.email_calls.load(Ordering::SeqCst), 0);
    let denied = fixture
        .gateway
        .resolve_confirmation(addr("10.1.2.3"), Some("alice-token"), &token, ConfirmationDecision::Deny)
        .unwrap();
    assert_eq!(denied, ConfirmationOutcome::Denied);
    let err = fixture
        .gateway
        .resolve_confirmation(
            addr("10.1.2.3"),
            Some("alice-token"),
            &token,
            ConfirmationDecision::Approve,
        )
        .expect_err("already resolved");
    assert_eq!(err.kind(), "already_resolved");
    assert_eq!(fixture.email_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn approval_runs_stored_arguments() {
    let fixture = gateway_fixture(&[], 300);
    let outcome = fixture
        .gateway
        .invoke(call(CapabilityKind::Tool, "sendEmail", json!({"to": "carol"}), "alice-token"))
        .unwrap();
    let InvocationOutcome::ConfirmationPending {
        token,
        ..
    } = outcome
    else {
        panic!("expected pending confirmation");
    };
    let approved = fixture
        .gateway
        .resolve_confirmation(None, Some("alice-token"), &token, ConfirmationDecision::Approve)
        .unwrap();
    assert_eq!(
        approved,
        ConfirmationOutcome::Approved {
            result: json!({"delivered": "carol"}),
        }
    );
    assert_eq!(fixture.email_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn confirmation_expires_after_ttl() {
    let fixture = gateway_fixture(&[], 1);
    let outcome = fixture
        .gateway
        .invoke(call(CapabilityKind::Tool, "sendEmail", json!({}), "alice-token"))
        .unwrap();
    let InvocationOutcome::ConfirmationPending {
        token,
        ..
    } = outcome
    else {
        panic!("expected pending confirmation");
    };
    fixture.clock.advance_seconds(2);
    let err = fixture
        .gateway
        .resolve_confirmation(None, Some("alice-token"), &token, ConfirmationDecision::Approve)
        .expect_err("expired");
    assert_eq!(err.kind(), "confirmation_expired");
}

#[test]
fn confirmation_is_scoped_to_requester() {
    let fixture = gateway_fixture(&[], 300);
    let outcome = fixture
        .gateway
        .invoke(call(CapabilityKind::Tool, "sendEmail", json!({}), "alice-token"))
        .unwrap();
    let InvocationOutcome::ConfirmationPending {
        token,
        ..
    } = outcome
    else {
        panic!("expected pending confirmation");
    };
    let err = fixture
        .gateway
        .resolve_confirmation(None, Some("bob-token"), &token, ConfirmationDecision::Approve)
        .expect_err("mismatch");
    assert_eq!(err.kind(), "identity_mismatch");
    let alice = fixture.gateway.pending_confirmations(None, Some("alice-token")).unwrap();
    assert_eq!(alice.len(), 1);
    let bob = fixture.gateway.pending_confirmations(None, Some("bob-token")).unwrap();
    assert!(bob.is_empty());
}

// ============================================================================
// SECTION: Registry Integration
// ============================================================================

#[test]
fn schema_violation_is_rejected_before_execution() {
    let fixture = gateway_fixture(&[], 300);
    let err = fixture
        .gateway
        .invoke(call(CapabilityKind::Tool, "add", json!({"a": "one", "b": 2}), "alice-token"))
        .expect_err("schema");
    assert_eq!(err.kind(), "invalid_arguments");
}

#[test]
fn templated_resource_binds_parameters() {
    let fixture = gateway_fixture(&[], 300);
    let outcome = fixture
        .gateway
        .invoke(call(CapabilityKind::Resource, "weather://oslo/current", json!({}), "alice-token"))
        .unwrap();
    assert_eq!(
        outcome,
        InvocationOutcome::Completed {
            result: json!({"city": "oslo", "temperature": 20}),
        }
    );
    let listed = fixture.gateway.list(CapabilityKind::Resource);
    assert_eq!(listed.len(), 2);
}

#[test]
fn templated_resource_is_not_reachable_by_bare_name() {
    let fixture = gateway_fixture(&[], 300);
    let err = fixture
        .gateway
        .invoke(call(CapabilityKind::Resource, "current_weather", json!({}), "alice-token"))
        .expect_err("bare template name");
    assert_eq!(err.kind(), "not_found");
    let err = fixture
        .gateway
        .invoke(call(CapabilityKind::Resource, "forecast", json!({}), "alice-token"))
        .expect_err("bare gated template name");
    assert_eq!(err.kind(), "not_found");
    assert!(fixture.gateway.pending_as(&identity("alice")).unwrap().is_empty());
}

#[test]
fn gated_template_approval_runs_with_bound_variables() {
    let fixture = gateway_fixture(&[], 300);
    let outcome = fixture
        .gateway
        .invoke(call(
            CapabilityKind::Resource,
            "forecast://bergen/tomorrow",
            json!({}),
            "alice-token",
        ))
        .unwrap();
    let InvocationOutcome::ConfirmationPending {
        token,
        ..
    } = outcome
    else {
        panic!("expected pending confirmation");
    };
    let approved = fixture
        .gateway
        .resolve_confirmation(None, Some("alice-token"), &token, ConfirmationDecision::Approve)
        .unwrap();
    assert_eq!(
        approved,
        ConfirmationOutcome::Approved {
            result: json!({"city": "bergen"}),
        }
    );
}
