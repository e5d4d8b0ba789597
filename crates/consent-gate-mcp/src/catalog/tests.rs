// crates/consent-gate-mcp/src/catalog/tests.rs
// ============================================================================
// Module: Capability Catalog Tests
// Description: Unit tests for the demo catalog and registry assembly.
// Purpose: Validate permission defaults, overrides, and handler behavior.
// Dependencies: consent-gate-mcp, serde_json
// ============================================================================

//! ## Overview
//! Builds registries from capability configuration and invokes demo handlers
//! directly.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use consent_gate_config::CapabilitiesConfig;
use consent_gate_config::CapabilityOverride;
use consent_gate_core::CapabilityArguments;
use consent_gate_core::CapabilityDescriptor;
use consent_gate_core::CapabilityKind;
use consent_gate_core::CapabilityRegistry;
use consent_gate_core::HandlerError;
use consent_gate_core::RegistryError;
use consent_gate_core::capability_fn;
use serde_json::Value;
use serde_json::json;

use super::CatalogError;
use super::build_registry;

fn registry(config: &CapabilitiesConfig) -> CapabilityRegistry {
    build_registry(config, Vec::new()).unwrap()
}

fn args(value: Value) -> CapabilityArguments {
    value.as_object().cloned().unwrap()
}

fn run(registry: &CapabilityRegistry, kind: CapabilityKind, name: &str, value: Value) -> Value {
    let resolved = registry.resolve(kind, name).unwrap();
    let arguments = resolved.merge_arguments(args(value));
    resolved.capability.validate_arguments(&arguments).unwrap();
    resolved.capability.invoke(&arguments).unwrap()
}

#[test]
fn demo_catalog_registers_every_capability() {
    let registry = registry(&CapabilitiesConfig::default());
    assert_eq!(registry.list_all(CapabilityKind::Tool).len(), 3);
    assert_eq!(registry.list_all(CapabilityKind::Resource).len(), 5);
}

#[test]
fn kind_defaults_gate_tools_but_not_resources() {
    let registry = registry(&CapabilitiesConfig::default());
    for tool in registry.list_all(CapabilityKind::Tool) {
        assert!(tool.requires_permission(), "{} should require permission", tool.name().as_str());
    }
    for resource in registry.list_all(CapabilityKind::Resource) {
        assert!(!resource.requires_permission());
    }
}

#[test]
fn overrides_flip_individual_capabilities() {
    let config = CapabilitiesConfig {
        overrides: vec![
            CapabilityOverride {
                kind: CapabilityKind::Tool,
                name: "add_two_numbers".to_string(),
                requires_permission: false,
            },
            CapabilityOverride {
                kind: CapabilityKind::Resource,
                name: "tell_a_joke".to_string(),
                requires_permission: true,
            },
        ],
        ..CapabilitiesConfig::default()
    };
    let registry = registry(&config);
    let add = registry.resolve(CapabilityKind::Tool, "add_two_numbers").unwrap();
    assert!(!add.capability.requires_permission());
    let divide = registry.resolve(CapabilityKind::Tool, "divide_two_numbers").unwrap();
    assert!(divide.capability.requires_permission());
    let joke = registry.resolve(CapabilityKind::Resource, "resource://tell_a_joke").unwrap();
    assert!(joke.capability.requires_permission());
}

#[test]
fn override_for_unknown_capability_fails() {
    let config = CapabilitiesConfig {
        overrides: vec![CapabilityOverride {
            kind: CapabilityKind::Tool,
            name: "send_email".to_string(),
            requires_permission: false,
        }],
        ..CapabilitiesConfig::default()
    };
    let err = build_registry(&config, Vec::new()).unwrap_err();
    assert!(matches!(err, CatalogError::UnknownOverride { .. }));
}

#[test]
fn extra_descriptors_register_alongside_the_catalog() {
    let config = CapabilitiesConfig {
        overrides: vec![CapabilityOverride {
            kind: CapabilityKind::Tool,
            name: "send_email".to_string(),
            requires_permission: false,
        }],
        ..CapabilitiesConfig::default()
    };
    let extra = CapabilityDescriptor::tool("send_email", capability_fn(|_| Ok(json!("sent"))));
    let registry = build_registry(&config, vec![extra]).unwrap();
    let email = registry.resolve(CapabilityKind::Tool, "send_email").unwrap();
    assert!(!email.capability.requires_permission());
}

#[test]
fn duplicate_extra_descriptor_is_rejected() {
    let extra =
        CapabilityDescriptor::tool("add_two_numbers", capability_fn(|_| Ok(Value::Null)));
    let err = build_registry(&CapabilitiesConfig::default(), vec![extra]).unwrap_err();
    assert!(matches!(err, CatalogError::Registry(RegistryError::Duplicate { .. })));
}

#[test]
fn disabled_catalog_registers_nothing() {
    let config = CapabilitiesConfig {
        builtin_catalog: false,
        ..CapabilitiesConfig::default()
    };
    assert!(registry(&config).is_empty());
}

#[test]
fn arithmetic_handlers() {
    let registry = registry(&CapabilitiesConfig::default());
    let sum = run(&registry, CapabilityKind::Tool, "add_two_numbers", json!({"a": 1, "b": 2}));
    assert_eq!(sum, json!(3));
    let mixed =
        run(&registry, CapabilityKind::Tool, "add_two_numbers_v2", json!({"a": 1.5, "b": 2}));
    assert_eq!(mixed, json!(3.5));
    let quotient =
        run(&registry, CapabilityKind::Tool, "divide_two_numbers", json!({"a": 9, "b": 2}));
    assert_eq!(quotient, json!(4.5));
}

#[test]
fn division_by_zero_fails() {
    let registry = registry(&CapabilitiesConfig::default());
    let resolved = registry.resolve(CapabilityKind::Tool, "divide_two_numbers").unwrap();
    let err = resolved.capability.invoke(&args(json!({"a": 1, "b": 0}))).unwrap_err();
    assert!(matches!(err, HandlerError::Failed(_)));
}

#[test]
fn operands_must_be_numbers() {
    let registry = registry(&CapabilitiesConfig::default());
    let resolved = registry.resolve(CapabilityKind::Tool, "add_two_numbers").unwrap();
    assert!(resolved.capability.validate_arguments(&args(json!({"a": "1", "b": 2}))).is_err());
    assert!(resolved.capability.validate_arguments(&args(json!({"a": 1}))).is_err());
}

#[test]
fn resources_and_templates_render() {
    let registry = registry(&CapabilitiesConfig::default());
    let hello = run(&registry, CapabilityKind::Resource, "resource://hello_world", json!({}));
    assert_eq!(hello, json!("Hello, from Consent Gate MCP Server!"));
    let greetings = run(&registry, CapabilityKind::Resource, "greetings", json!({}));
    assert_eq!(greetings, json!("Hello, from Consent Gate MCP Server! (v2)"));
    let past = run(
        &registry,
        CapabilityKind::Resource,
        "weather://bergen/2024-01-01/past_weather",
        json!({}),
    );
    assert_eq!(
        past,
        json!({
            "city": "bergen",
            "date": "2024-01-01",
            "temperature": 15,
            "description": "Cloudy",
            "units": "C"
        })
    );
}
