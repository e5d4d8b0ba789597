// crates/consent-gate-core/src/runtime/registry.rs
// ============================================================================
// Module: Consent Gate Capability Registry
// Description: Boot-time registry of tools, resources, and resource templates.
// Purpose: Resolve invocations to handlers and enforce registration invariants.
// Dependencies: crate::core, jsonschema, thiserror
// ============================================================================

//! ## Overview
//! The registry is populated once at startup and then shared read-only.
//! Registration fails closed:
//! - a repeated (kind, name) pair or resource URI is [`RegistryError::Duplicate`];
//! - a template that could match the same URI as an existing template is
//!   [`RegistryError::AmbiguousTemplate`];
//! - an uncompilable argument schema is [`RegistryError::InvalidSchema`].
//!
//! Resolution order for resources is exact name, then exact static URI, then
//! templates in registration order. Because overlapping templates are
//! rejected, at most one template can match any URI.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

use crate::core::CapabilityArguments;
use crate::core::CapabilityDescriptor;
use crate::core::CapabilityKind;
use crate::core::CapabilityName;
use crate::core::PermissionPolicy;
use crate::core::ResourceLocator;
use crate::core::UriTemplate;
use crate::interfaces::HandlerError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Per-kind confirmation defaults applied to [`PermissionPolicy::KindDefault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDefaults {
    /// Whether tools require confirmation by default.
    pub tool_requires_permission: bool,
    /// Whether resources require confirmation by default.
    pub resource_requires_permission: bool,
}

impl Default for PermissionDefaults {
    fn default() -> Self {
        Self {
            tool_requires_permission: true,
            resource_requires_permission: false,
        }
    }
}

impl PermissionDefaults {
    /// Returns the default for a capability kind.
    #[must_use]
    pub const fn for_kind(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Tool => self.tool_requires_permission,
            CapabilityKind::Resource => self.resource_requires_permission,
        }
    }
}

/// Registered capability with its resolved policy and compiled schema.
pub struct RegisteredCapability {
    /// Descriptor supplied at registration.
    descriptor: CapabilityDescriptor,
    /// Effective confirmation requirement.
    requires_permission: bool,
    /// Parsed resource template, if any.
    template: Option<UriTemplate>,
    /// Compiled argument schema, if any.
    validator: Option<Validator>,
}

impl RegisteredCapability {
    /// Returns the descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    /// Returns the capability kind.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        self.descriptor.kind
    }

    /// Returns the capability name.
    #[must_use]
    pub const fn name(&self) -> &CapabilityName {
        &self.descriptor.name
    }

    /// Returns true when invocation must be confirmed first.
    #[must_use]
    pub const fn requires_permission(&self) -> bool {
        self.requires_permission
    }

    /// Returns the static resource URI, if any.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        match &self.descriptor.locator {
            Some(ResourceLocator::Static(uri)) => Some(uri),
            _ => None,
        }
    }

    /// Returns the resource template, if any.
    #[must_use]
    pub const fn uri_template(&self) -> Option<&UriTemplate> {
        self.template.as_ref()
    }

    /// Validates arguments against the declared schema.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidArguments`] with the first violation.
    pub fn validate_arguments(&self, arguments: &CapabilityArguments) -> Result<(), RegistryError> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let instance = Value::Object(arguments.clone());
        let mut errors = validator.iter_errors(&instance);
        match errors.next() {
            None => Ok(()),
            Some(error) => Err(RegistryError::InvalidArguments {
                name: self.descriptor.name.to_string(),
                error: error.to_string(),
            }),
        }
    }

    /// Runs the capability handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the handler fails.
    pub fn invoke(&self, arguments: &CapabilityArguments) -> Result<Value, HandlerError> {
        self.descriptor.handler.invoke(arguments)
    }
}

impl fmt::Debug for RegisteredCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCapability")
            .field("descriptor", &self.descriptor)
            .field("requires_permission", &self.requires_permission)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// Capability resolved for a specific invocation.
#[derive(Debug, Clone)]
pub struct ResolvedCapability {
    /// Registered capability.
    pub capability: Arc<RegisteredCapability>,
    /// Template variables bound from the requested URI.
    pub bindings: BTreeMap<String, String>,
    /// Concrete URI requested, for resources.
    pub uri: Option<String>,
}

impl ResolvedCapability {
    /// Merges template bindings and the URI into caller arguments.
    ///
    /// Bound template values take precedence over caller-supplied keys.
    #[must_use]
    pub fn merge_arguments(&self, mut arguments: CapabilityArguments) -> CapabilityArguments {
        if let Some(uri) = &self.uri {
            arguments.insert("uri".to_string(), Value::String(uri.clone()));
        }
        for (name, value) in &self.bindings {
            arguments.insert(name.clone(), Value::String(value.clone()));
        }
        arguments
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A capability with the same kind and name or URI is registered.
    #[error("duplicate capability: {kind} {name}")]
    Duplicate {
        /// Capability kind.
        kind: CapabilityKind,
        /// Conflicting name or URI.
        name: String,
    },
    /// A resource template overlaps an existing template.
    #[error("ambiguous template: {template} overlaps {existing}")]
    AmbiguousTemplate {
        /// Template being registered.
        template: String,
        /// Previously registered template.
        existing: String,
    },
    /// Descriptor is structurally invalid.
    #[error("invalid capability descriptor {name}: {reason}")]
    InvalidDescriptor {
        /// Capability name.
        name: String,
        /// Failure reason.
        reason: String,
    },
    /// Argument schema failed to compile.
    #[error("invalid input schema for {name}: {error}")]
    InvalidSchema {
        /// Capability name.
        name: String,
        /// Compiler error.
        error: String,
    },
    /// Capability was not found.
    #[error("capability not found: {kind} {name}")]
    NotFound {
        /// Capability kind.
        kind: CapabilityKind,
        /// Requested name or URI.
        name: String,
    },
    /// Invocation arguments failed schema validation.
    #[error("invalid arguments for {name}: {error}")]
    InvalidArguments {
        /// Capability name.
        name: String,
        /// First validation error.
        error: String,
    },
}

impl RegistryError {
    /// Returns a stable error label.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Duplicate {
                ..
            } => "duplicate_capability",
            Self::AmbiguousTemplate {
                ..
            } => "ambiguous_template",
            Self::InvalidDescriptor {
                ..
            } => "invalid_descriptor",
            Self::InvalidSchema {
                ..
            } => "invalid_schema",
            Self::NotFound {
                ..
            } => "not_found",
            Self::InvalidArguments {
                ..
            } => "invalid_arguments",
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Capability registry.
///
/// # Invariants
/// - (kind, name) pairs are unique.
/// - Static resource URIs and template strings are unique.
/// - No two templates overlap.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    /// Defaults for [`PermissionPolicy::KindDefault`].
    defaults: PermissionDefaults,
    /// Entries in registration order.
    entries: Vec<Arc<RegisteredCapability>>,
    /// Index by (kind, name).
    by_name: BTreeMap<(CapabilityKind, CapabilityName), usize>,
    /// Index by static resource URI.
    by_uri: BTreeMap<String, usize>,
    /// Indices of templated resources, in registration order.
    templates: Vec<usize>,
}

impl CapabilityRegistry {
    /// Creates an empty registry with the provided defaults.
    #[must_use]
    pub fn new(defaults: PermissionDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Returns the per-kind defaults.
    #[must_use]
    pub const fn defaults(&self) -> PermissionDefaults {
        self.defaults
    }

    /// Registers a capability.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the descriptor conflicts with an existing
    /// registration or is invalid.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<(), RegistryError> {
        let key = (descriptor.kind, descriptor.name.clone());
        if self.by_name.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                kind: descriptor.kind,
                name: descriptor.name.to_string(),
            });
        }
        let template = self.check_locator(&descriptor)?;
        let validator = compile_schema(&descriptor)?;
        let requires_permission = match descriptor.permission {
            PermissionPolicy::Required => true,
            PermissionPolicy::NotRequired => false,
            PermissionPolicy::KindDefault => self.defaults.for_kind(descriptor.kind),
        };
        let index = self.entries.len();
        if let Some(ResourceLocator::Static(uri)) = &descriptor.locator {
            self.by_uri.insert(uri.clone(), index);
        }
        if template.is_some() {
            self.templates.push(index);
        }
        self.by_name.insert(key, index);
        self.entries.push(Arc::new(RegisteredCapability {
            descriptor,
            requires_permission,
            template,
            validator,
        }));
        Ok(())
    }

    /// Resolves a capability by kind and name. Resources also resolve by
    /// static URI and by template match. Templated resources resolve only
    /// through a concrete URI, never by bare name, so handlers always see
    /// their bound variables.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when nothing matches.
    pub fn resolve(&self, kind: CapabilityKind, name: &str) -> Result<ResolvedCapability, RegistryError> {
        let key = (kind, CapabilityName::new(name));
        let by_name = self
            .by_name
            .get(&key)
            .filter(|index| self.entries[**index].uri_template().is_none());
        if let Some(index) = by_name {
            let capability = Arc::clone(&self.entries[*index]);
            let uri = capability.uri().map(str::to_string);
            return Ok(ResolvedCapability {
                capability,
                bindings: BTreeMap::new(),
                uri,
            });
        }
        if kind == CapabilityKind::Resource {
            if let Some(index) = self.by_uri.get(name) {
                return Ok(ResolvedCapability {
                    capability: Arc::clone(&self.entries[*index]),
                    bindings: BTreeMap::new(),
                    uri: Some(name.to_string()),
                });
            }
            for index in &self.templates {
                let capability = &self.entries[*index];
                let bindings = capability.uri_template().and_then(|template| template.match_uri(name));
                if let Some(bindings) = bindings {
                    return Ok(ResolvedCapability {
                        capability: Arc::clone(capability),
                        bindings,
                        uri: Some(name.to_string()),
                    });
                }
            }
        }
        Err(RegistryError::NotFound {
            kind,
            name: name.to_string(),
        })
    }

    /// Returns the capability registered under an exact name, templated
    /// resources included.
    #[must_use]
    pub fn get(&self, kind: CapabilityKind, name: &str) -> Option<Arc<RegisteredCapability>> {
        let key = (kind, CapabilityName::new(name));
        self.by_name.get(&key).map(|index| Arc::clone(&self.entries[*index]))
    }

    /// Lists capabilities of a kind in registration order.
    #[must_use]
    pub fn list_all(&self, kind: CapabilityKind) -> Vec<Arc<RegisteredCapability>> {
        self.entries.iter().filter(|entry| entry.kind() == kind).cloned().collect()
    }

    /// Returns the number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates the resource locator and parses templates.
    fn check_locator(
        &self,
        descriptor: &CapabilityDescriptor,
    ) -> Result<Option<UriTemplate>, RegistryError> {
        let name = descriptor.name.to_string();
        match (descriptor.kind, &descriptor.locator) {
            (CapabilityKind::Tool, None) => Ok(None),
            (CapabilityKind::Tool, Some(_)) => Err(RegistryError::InvalidDescriptor {
                name,
                reason: "tools cannot declare a resource uri".to_string(),
            }),
            (CapabilityKind::Resource, None) => Err(RegistryError::InvalidDescriptor {
                name,
                reason: "resources require a uri or uri template".to_string(),
            }),
            (CapabilityKind::Resource, Some(ResourceLocator::Static(uri))) => {
                if uri.is_empty() {
                    return Err(RegistryError::InvalidDescriptor {
                        name,
                        reason: "resource uri is empty".to_string(),
                    });
                }
                if self.by_uri.contains_key(uri) {
                    return Err(RegistryError::Duplicate {
                        kind: CapabilityKind::Resource,
                        name: uri.clone(),
                    });
                }
                Ok(None)
            }
            (CapabilityKind::Resource, Some(ResourceLocator::Template(raw))) => {
                let template = UriTemplate::parse(raw).map_err(|err| {
                    RegistryError::InvalidDescriptor {
                        name,
                        reason: err.to_string(),
                    }
                })?;
                for index in &self.templates {
                    let Some(existing) = self.entries[*index].uri_template() else {
                        continue;
                    };
                    if existing.as_str() == template.as_str() {
                        return Err(RegistryError::Duplicate {
                            kind: CapabilityKind::Resource,
                            name: raw.clone(),
                        });
                    }
                    if existing.overlaps(&template) {
                        return Err(RegistryError::AmbiguousTemplate {
                            template: raw.clone(),
                            existing: existing.to_string(),
                        });
                    }
                }
                Ok(Some(template))
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Compiles the descriptor's argument schema with JSON Schema 2020-12.
fn compile_schema(descriptor: &CapabilityDescriptor) -> Result<Option<Validator>, RegistryError> {
    let Some(schema) = &descriptor.input_schema else {
        return Ok(None);
    };
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map(Some)
        .map_err(|err| RegistryError::InvalidSchema {
            name: descriptor.name.to_string(),
            error: err.to_string(),
        })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
