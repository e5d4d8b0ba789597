// crates/consent-gate-core/src/core/capability.rs
// ============================================================================
// Module: Consent Gate Capabilities
// Description: Capability descriptors for tools and resources.
// Purpose: Describe invocable capabilities and their consent requirements.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A capability is a tool or a resource. Descriptors are built once at boot,
//! handed to the [`crate::runtime::CapabilityRegistry`], and never mutated
//! afterward. Whether a capability needs user confirmation is declared through
//! [`PermissionPolicy`]; [`PermissionPolicy::KindDefault`] defers to the
//! per-kind defaults configured on the registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::CapabilityName;
use crate::interfaces::CapabilityHandler;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Arguments passed to a capability handler.
pub type CapabilityArguments = Map<String, Value>;

/// Capability kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Callable tool.
    Tool,
    /// Readable resource.
    Resource,
}

impl CapabilityKind {
    /// Returns a stable label for this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
        }
    }

    /// Parses a stable kind label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "tool" => Some(Self::Tool),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Declared confirmation requirement for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Always require user confirmation.
    Required,
    /// Never require user confirmation.
    NotRequired,
    /// Use the registry default for the capability kind.
    #[default]
    KindDefault,
}

/// How a resource is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    /// Fixed URI such as `resource://hello_world`.
    Static(String),
    /// Parameterized URI template such as `weather://{city}/current`.
    Template(String),
}

/// Capability descriptor supplied at registration time.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Name unique within the kind.
    pub name: CapabilityName,
    /// Human-readable description for discovery.
    pub description: Option<String>,
    /// Confirmation requirement.
    pub permission: PermissionPolicy,
    /// Resource address (resources only).
    pub locator: Option<ResourceLocator>,
    /// Optional JSON Schema for invocation arguments.
    pub input_schema: Option<Value>,
    /// Invocation handler.
    pub handler: Arc<dyn CapabilityHandler>,
}

impl CapabilityDescriptor {
    /// Builds a tool descriptor.
    #[must_use]
    pub fn tool(name: impl Into<CapabilityName>, handler: impl CapabilityHandler + 'static) -> Self {
        Self {
            kind: CapabilityKind::Tool,
            name: name.into(),
            description: None,
            permission: PermissionPolicy::KindDefault,
            locator: None,
            input_schema: None,
            handler: Arc::new(handler),
        }
    }

    /// Builds a static resource descriptor.
    #[must_use]
    pub fn resource(
        name: impl Into<CapabilityName>,
        uri: impl Into<String>,
        handler: impl CapabilityHandler + 'static,
    ) -> Self {
        Self {
            kind: CapabilityKind::Resource,
            name: name.into(),
            description: None,
            permission: PermissionPolicy::KindDefault,
            locator: Some(ResourceLocator::Static(uri.into())),
            input_schema: None,
            handler: Arc::new(handler),
        }
    }

    /// Builds a templated resource descriptor.
    #[must_use]
    pub fn resource_template(
        name: impl Into<CapabilityName>,
        template: impl Into<String>,
        handler: impl CapabilityHandler + 'static,
    ) -> Self {
        Self {
            kind: CapabilityKind::Resource,
            name: name.into(),
            description: None,
            permission: PermissionPolicy::KindDefault,
            locator: Some(ResourceLocator::Template(template.into())),
            input_schema: None,
            handler: Arc::new(handler),
        }
    }

    /// Returns a copy with the description set.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns a copy with the permission policy set.
    #[must_use]
    pub fn with_permission(mut self, permission: PermissionPolicy) -> Self {
        self.permission = permission;
        self
    }

    /// Returns a copy requiring (or not requiring) confirmation.
    #[must_use]
    pub fn requires_permission(self, required: bool) -> Self {
        self.with_permission(if required {
            PermissionPolicy::Required
        } else {
            PermissionPolicy::NotRequired
        })
    }

    /// Returns a copy with the argument schema set.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("permission", &self.permission)
            .field("locator", &self.locator)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}
