// crates/consent-gate-mcp/src/catalog.rs
// ============================================================================
// Module: Capability Catalog
// Description: Built-in demo capabilities and registry assembly.
// Purpose: Build the boot-time capability registry from configuration.
// Dependencies: consent-gate-core, consent-gate-config, serde_json
// ============================================================================

//! ## Overview
//! The demo catalog registers a handful of arithmetic tools, static text
//! resources, and weather resource templates. [`build_registry`] registers
//! the catalog (when enabled) plus any host-supplied descriptors, applying
//! per-kind permission defaults and per-capability overrides. An override
//! naming a capability that never registered fails the build, so typos in
//! configuration cannot silently leave a capability unguarded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use consent_gate_config::CapabilitiesConfig;
use consent_gate_core::CapabilityArguments;
use consent_gate_core::CapabilityDescriptor;
use consent_gate_core::CapabilityKind;
use consent_gate_core::CapabilityRegistry;
use consent_gate_core::HandlerError;
use consent_gate_core::RegistryError;
use consent_gate_core::capability_fn;
use serde_json::Number;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Text served by `resource://hello_world`.
const HELLO_WORLD: &str = "Hello, from Consent Gate MCP Server!";

/// Text served by `resource://hello_world_v2`.
const HELLO_WORLD_V2: &str = "Hello, from Consent Gate MCP Server! (v2)";

/// Text served by `resource://tell_a_joke`.
const JOKE: &str = "A neutron walks into a bar and says 'I'd like a beer please, how much?', \
                    the bartender says 'for you, no charge.'";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry assembly errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A descriptor was rejected at registration.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A permission override names no registered capability.
    #[error("capabilities.overrides names unknown {kind} capability: {name}")]
    UnknownOverride {
        /// Capability kind.
        kind: CapabilityKind,
        /// Capability name.
        name: String,
    },
}

// ============================================================================
// SECTION: Registry Assembly
// ============================================================================

/// Builds the capability registry from configuration and extra descriptors.
///
/// # Errors
///
/// Returns [`CatalogError`] on duplicate names, overlapping templates, invalid
/// schemas, or overrides for unknown capabilities.
pub fn build_registry(
    config: &CapabilitiesConfig,
    extra: impl IntoIterator<Item = CapabilityDescriptor>,
) -> Result<CapabilityRegistry, CatalogError> {
    let mut registry = CapabilityRegistry::new(config.permission_defaults());
    let builtin = if config.builtin_catalog { demo_catalog() } else { Vec::new() };
    for descriptor in builtin.into_iter().chain(extra) {
        let descriptor = match config.override_for(descriptor.kind, descriptor.name.as_str()) {
            Some(required) => descriptor.requires_permission(required),
            None => descriptor,
        };
        registry.register(descriptor)?;
    }
    for entry in &config.overrides {
        let known = registry
            .list_all(entry.kind)
            .iter()
            .any(|capability| capability.name().as_str() == entry.name);
        if !known {
            return Err(CatalogError::UnknownOverride {
                kind: entry.kind,
                name: entry.name.clone(),
            });
        }
    }
    Ok(registry)
}

// ============================================================================
// SECTION: Demo Catalog
// ============================================================================

/// Returns the built-in demo capabilities.
#[must_use]
pub fn demo_catalog() -> Vec<CapabilityDescriptor> {
    vec![
        CapabilityDescriptor::tool("add_two_numbers", capability_fn(add_numbers))
            .with_description("Add two numbers together and return the sum.")
            .with_input_schema(operand_schema()),
        CapabilityDescriptor::tool("add_two_numbers_v2", capability_fn(add_numbers))
            .with_description("Add two numbers together.")
            .with_input_schema(operand_schema()),
        CapabilityDescriptor::tool("divide_two_numbers", capability_fn(divide_numbers))
            .with_description("Divide the first number by the second.")
            .with_input_schema(operand_schema()),
        CapabilityDescriptor::resource(
            "hello_world",
            "resource://hello_world",
            capability_fn(|_| Ok(Value::String(HELLO_WORLD.to_string()))),
        )
        .with_description("Provides a message"),
        CapabilityDescriptor::resource(
            "greetings",
            "resource://hello_world_v2",
            capability_fn(|_| Ok(Value::String(HELLO_WORLD_V2.to_string()))),
        )
        .with_description("Provides a message"),
        CapabilityDescriptor::resource(
            "tell_a_joke",
            "resource://tell_a_joke",
            capability_fn(|_| Ok(Value::String(JOKE.to_string()))),
        )
        .with_description("Provides a joke"),
        CapabilityDescriptor::resource_template(
            "current_weather",
            "weather://{city}/current",
            capability_fn(current_weather),
        )
        .with_description("Provide the current weather for a given city."),
        CapabilityDescriptor::resource_template(
            "past_weather",
            "weather://{city}/{date}/past_weather",
            capability_fn(past_weather),
        )
        .with_description("Provide the past weather for a given city and date."),
    ]
}

/// Schema requiring numeric `a` and `b`.
fn operand_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "number", "description": "The first number"},
            "b": {"type": "number", "description": "The second number"}
        },
        "required": ["a", "b"]
    })
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Adds `a` and `b`, keeping integer results integral.
fn add_numbers(arguments: &CapabilityArguments) -> Result<Value, HandlerError> {
    let a = numeric_argument(arguments, "a")?;
    let b = numeric_argument(arguments, "b")?;
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a
            .checked_add(b)
            .map(Value::from)
            .ok_or_else(|| HandlerError::Failed("integer overflow".to_string()));
    }
    float_value(as_float(a)? + as_float(b)?)
}

/// Divides `a` by `b`.
fn divide_numbers(arguments: &CapabilityArguments) -> Result<Value, HandlerError> {
    let a = as_float(numeric_argument(arguments, "a")?)?;
    let b = as_float(numeric_argument(arguments, "b")?)?;
    if b == 0.0 {
        return Err(HandlerError::Failed("division by zero".to_string()));
    }
    float_value(a / b)
}

/// Returns canned current weather for the bound city.
fn current_weather(arguments: &CapabilityArguments) -> Result<Value, HandlerError> {
    let city = string_argument(arguments, "city")?;
    Ok(json!({
        "city": city,
        "temperature": 20,
        "description": "Sunny",
        "units": "C"
    }))
}

/// Returns canned past weather for the bound city and date.
fn past_weather(arguments: &CapabilityArguments) -> Result<Value, HandlerError> {
    let city = string_argument(arguments, "city")?;
    let date = string_argument(arguments, "date")?;
    Ok(json!({
        "city": city,
        "date": date,
        "temperature": 15,
        "description": "Cloudy",
        "units": "C"
    }))
}

/// Reads a numeric argument.
fn numeric_argument<'a>(
    arguments: &'a CapabilityArguments,
    name: &str,
) -> Result<&'a Number, HandlerError> {
    match arguments.get(name) {
        Some(Value::Number(number)) => Ok(number),
        _ => Err(HandlerError::InvalidArguments(format!("{name} must be a number"))),
    }
}

/// Reads a string argument.
fn string_argument<'a>(
    arguments: &'a CapabilityArguments,
    name: &str,
) -> Result<&'a str, HandlerError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::InvalidArguments(format!("{name} must be a string")))
}

/// Converts a JSON number to `f64`.
fn as_float(number: &Number) -> Result<f64, HandlerError> {
    number
        .as_f64()
        .ok_or_else(|| HandlerError::InvalidArguments("number out of range".to_string()))
}

/// Wraps a finite `f64` as a JSON number.
fn float_value(value: f64) -> Result<Value, HandlerError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| HandlerError::Failed("result is not a finite number".to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
