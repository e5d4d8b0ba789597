// crates/consent-gate-mcp/src/router.rs
// ============================================================================
// Module: Gateway Router
// Description: JSON-RPC method dispatch over the authorization gateway.
// Purpose: Translate MCP methods into gateway calls and audit every request.
// Dependencies: consent-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! [`GatewayRouter`] is transport-agnostic: it receives a method name, raw
//! params, and a [`RequestContext`], authenticates through the
//! [`consent_gate_core::Gateway`], and returns the JSON result payload. Every
//! dispatch records exactly one `gateway_request` audit event; confirmation
//! resolves additionally record `confirmation_resolved`.
//!
//! Confirmation resolves answer with `{status, result?, errorKind?}`. Broker
//! refusals (unknown token, replay, expiry, foreign identity) and handler
//! failures are reported in that shape; JSON-RPC errors are reserved for
//! origin, token, param, and internal failures.
//!
//! Security posture: params are untrusted and decoded with
//! `deny_unknown_fields`; authentication always precedes any registry lookup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use consent_gate_core::CapabilityArguments;
use consent_gate_core::CapabilityKind;
use consent_gate_core::ConfirmationDecision;
use consent_gate_core::ConfirmationOutcome;
use consent_gate_core::ConfirmationToken;
use consent_gate_core::Gateway;
use consent_gate_core::GatewayError;
use consent_gate_core::Identity;
use consent_gate_core::InvocationOutcome;
use consent_gate_core::RegisteredCapability;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::AuditDecision;
use crate::audit::AuditSink;
use crate::audit::ConfirmationAuditEvent;
use crate::audit::ConfirmationAuditEventParams;
use crate::audit::GatewayAuditEvent;
use crate::audit::GatewayAuditEventParams;
use crate::auth::RequestContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of the digest prefix used as a confirmation reference.
const REFERENCE_LENGTH: usize = 12;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Router failures surfaced as JSON-RPC errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Method is not served.
    #[error("method not found: {0}")]
    MethodNotFound(String),
    /// Params failed to decode.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// Gateway pipeline failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl RouterError {
    /// Returns the stable error kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MethodNotFound(_) => "method_not_found",
            Self::InvalidParams(_) => "invalid_params",
            Self::Gateway(err) => err.kind(),
        }
    }

    /// Returns true when the caller was refused rather than failed.
    const fn is_denial(&self) -> bool {
        match self {
            Self::Gateway(err) => {
                err.is_auth_failure() || matches!(err, GatewayError::IdentityMismatch)
            }
            _ => false,
        }
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// `tools/call` params.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Tool arguments.
    #[serde(default)]
    arguments: Option<CapabilityArguments>,
}

/// `resources/read` params.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceReadParams {
    /// Resource URI or name.
    uri: String,
    /// Extra arguments merged with template bindings.
    #[serde(default)]
    arguments: Option<CapabilityArguments>,
}

/// `confirmations/resolve` params.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ResolveParams {
    /// Token returned in the pending response.
    confirmation_token: String,
    /// Caller decision.
    decision: ConfirmationDecision,
}

/// Tool entry in `tools/list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDefinition {
    /// Tool name.
    name: String,
    /// Tool description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Argument schema.
    input_schema: Value,
    /// Whether calls require confirmation.
    requires_permission: bool,
}

/// Resource entry in `resources/list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDefinition {
    /// Static resource URI.
    uri: String,
    /// Resource name.
    name: String,
    /// Resource description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Whether reads require confirmation.
    requires_permission: bool,
}

/// Template entry in `resources/templates/list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceTemplateDefinition {
    /// URI template.
    uri_template: String,
    /// Template name.
    name: String,
    /// Template description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Whether reads require confirmation.
    requires_permission: bool,
}

/// Capability output payloads.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// JSON output.
    Json {
        /// JSON payload.
        json: Value,
    },
}

// ============================================================================
// SECTION: Audit Trail
// ============================================================================

/// Facts gathered while handling one request, for the audit event.
#[derive(Debug, Default)]
struct AuditTrail {
    /// Capability name or resource URI.
    capability: Option<String>,
    /// Verified subject.
    subject: Option<String>,
    /// Token fingerprint.
    token_fingerprint: Option<String>,
    /// Capability was parked for confirmation.
    pending: bool,
    /// Failure reported inside a successful response.
    error_kind: Option<&'static str>,
    /// The reported failure refused the caller.
    refused: bool,
}

impl AuditTrail {
    /// Records the verified identity.
    fn identify(&mut self, identity: &Identity) {
        self.subject = Some(identity.subject.clone());
        self.token_fingerprint = Some(identity.token_fingerprint.clone());
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// JSON-RPC method router over the gateway.
#[derive(Clone)]
pub struct GatewayRouter {
    /// Authorization gateway.
    gateway: Gateway,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

impl GatewayRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(gateway: Gateway, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            gateway,
            audit,
        }
    }

    /// Returns the gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit(&self) -> Arc<dyn AuditSink> {
        Arc::clone(&self.audit)
    }

    /// Dispatches a method and records the request audit event.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] when the method is unknown, params are invalid,
    /// or the gateway refuses or fails the request.
    pub fn dispatch(
        &self,
        context: &RequestContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RouterError> {
        let mut trail = AuditTrail::default();
        let result = self.route(context, method, params, &mut trail);
        let (decision, error_kind) = match &result {
            Ok(_) if trail.refused => (AuditDecision::Deny, trail.error_kind),
            Ok(_) if trail.error_kind.is_some() => (AuditDecision::Error, trail.error_kind),
            Ok(_) if trail.pending => (AuditDecision::Pending, None),
            Ok(_) => (AuditDecision::Allow, None),
            Err(err) if err.is_denial() => (AuditDecision::Deny, Some(err.kind())),
            Err(err) => (AuditDecision::Error, Some(err.kind())),
        };
        self.audit.record(&GatewayAuditEvent::new(GatewayAuditEventParams {
            request_id: context.request_id.clone(),
            peer_ip: context.peer_ip.map(|ip| ip.to_string()),
            method: method.to_string(),
            capability: trail.capability,
            decision,
            subject: trail.subject,
            token_fingerprint: trail.token_fingerprint,
            error_kind,
        }));
        result
    }

    /// Routes a method to its handler.
    fn route(
        &self,
        context: &RequestContext,
        method: &str,
        params: Option<Value>,
        trail: &mut AuditTrail,
    ) -> Result<Value, RouterError> {
        match method {
            "tools/list" => {
                self.authenticate(context, trail)?;
                let tools: Vec<ToolDefinition> = self
                    .gateway
                    .list(CapabilityKind::Tool)
                    .iter()
                    .map(|capability| tool_definition(capability.as_ref()))
                    .collect();
                Ok(json!({"tools": tools}))
            }
            "resources/list" => {
                self.authenticate(context, trail)?;
                let resources: Vec<ResourceDefinition> = self
                    .gateway
                    .list(CapabilityKind::Resource)
                    .iter()
                    .filter_map(|capability| resource_definition(capability.as_ref()))
                    .collect();
                Ok(json!({"resources": resources}))
            }
            "resources/templates/list" => {
                self.authenticate(context, trail)?;
                let templates: Vec<ResourceTemplateDefinition> = self
                    .gateway
                    .list(CapabilityKind::Resource)
                    .iter()
                    .filter_map(|capability| template_definition(capability.as_ref()))
                    .collect();
                Ok(json!({"resourceTemplates": templates}))
            }
            "tools/call" => {
                let identity = self.authenticate(context, trail)?;
                let call: ToolCallParams = decode_params(params)?;
                trail.capability = Some(call.name.clone());
                let outcome = self.gateway.invoke_as(
                    &identity,
                    CapabilityKind::Tool,
                    &call.name,
                    call.arguments.unwrap_or_default(),
                )?;
                trail.pending = matches!(outcome, InvocationOutcome::ConfirmationPending { .. });
                Ok(render_outcome(outcome, |json| {
                    json!({"content": [ToolContent::Json { json }]})
                }))
            }
            "resources/read" => {
                let identity = self.authenticate(context, trail)?;
                let read: ResourceReadParams = decode_params(params)?;
                trail.capability = Some(read.uri.clone());
                let outcome = self.gateway.invoke_as(
                    &identity,
                    CapabilityKind::Resource,
                    &read.uri,
                    read.arguments.unwrap_or_default(),
                )?;
                trail.pending = matches!(outcome, InvocationOutcome::ConfirmationPending { .. });
                let uri = read.uri;
                Ok(render_outcome(outcome, move |json| {
                    json!({"contents": [{"uri": uri, "type": "json", "json": json}]})
                }))
            }
            "confirmations/resolve" => {
                let identity = self.authenticate(context, trail)?;
                let resolve: ResolveParams = decode_params(params)?;
                self.resolve(context, &identity, &resolve, trail)
            }
            "confirmations/list" => {
                let identity = self.authenticate(context, trail)?;
                let confirmations = self.gateway.pending_as(&identity)?;
                Ok(json!({"confirmations": confirmations}))
            }
            other => Err(RouterError::MethodNotFound(other.to_string())),
        }
    }

    /// Authenticates the request and records the identity.
    fn authenticate(
        &self,
        context: &RequestContext,
        trail: &mut AuditTrail,
    ) -> Result<Identity, RouterError> {
        let token = context.bearer_token();
        let identity = self.gateway.authenticate(context.peer_ip, token.as_deref())?;
        trail.identify(&identity);
        Ok(identity)
    }

    /// Resolves a confirmation and records the resolve audit event.
    fn resolve(
        &self,
        context: &RequestContext,
        identity: &Identity,
        params: &ResolveParams,
        trail: &mut AuditTrail,
    ) -> Result<Value, RouterError> {
        let token = ConfirmationToken::from_presented(params.confirmation_token.clone());
        let reference: String = token.digest().chars().take(REFERENCE_LENGTH).collect();
        trail.capability = Some(reference.clone());
        let result = self.gateway.resolve_as(identity, &token, params.decision);
        let (outcome, error_kind, response) = match result {
            Ok(ConfirmationOutcome::Approved {
                result,
            }) => ("approved", None, Ok(json!({"status": "approved", "result": result}))),
            Ok(ConfirmationOutcome::Denied) => ("denied", None, Ok(json!({"status": "denied"}))),
            Err(GatewayError::CapabilityExecutionFailed(message)) => {
                let kind = "capability_execution_failed";
                trail.error_kind = Some(kind);
                (
                    "error",
                    Some(kind),
                    Ok(json!({"status": "error", "errorKind": kind, "message": message})),
                )
            }
            Err(
                err @ (GatewayError::UnknownConfirmation
                | GatewayError::AlreadyResolved
                | GatewayError::IdentityMismatch
                | GatewayError::ConfirmationExpired),
            ) => {
                let kind = err.kind();
                trail.error_kind = Some(kind);
                trail.refused = matches!(err, GatewayError::IdentityMismatch);
                ("error", Some(kind), Ok(json!({"status": "error", "errorKind": kind})))
            }
            Err(err) => ("error", Some(err.kind()), Err(RouterError::from(err))),
        };
        self.audit.record_confirmation(&ConfirmationAuditEvent::new(
            ConfirmationAuditEventParams {
                request_id: context.request_id.clone(),
                reference,
                decision: params.decision,
                outcome,
                subject: identity.subject.clone(),
                error_kind,
            },
        ));
        response
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes method params, treating absent params as an empty object.
fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RouterError> {
    let params = params.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(params).map_err(|err| RouterError::InvalidParams(err.to_string()))
}

/// Renders an invocation outcome; `completed` wraps the capability result.
fn render_outcome(outcome: InvocationOutcome, completed: impl FnOnce(Value) -> Value) -> Value {
    match outcome {
        InvocationOutcome::Completed {
            result,
        } => {
            let mut payload = completed(result);
            if let Value::Object(map) = &mut payload {
                map.insert("status".to_string(), Value::String("completed".to_string()));
            }
            payload
        }
        InvocationOutcome::ConfirmationPending {
            token,
            expires_at,
        } => json!({
            "status": "pending",
            "confirmationToken": token.as_str(),
            "expiresAt": expires_at,
        }),
    }
}

/// Builds a `tools/list` entry.
fn tool_definition(capability: &RegisteredCapability) -> ToolDefinition {
    let descriptor = capability.descriptor();
    ToolDefinition {
        name: capability.name().as_str().to_string(),
        description: descriptor.description.clone(),
        input_schema: descriptor
            .input_schema
            .clone()
            .unwrap_or_else(|| json!({"type": "object"})),
        requires_permission: capability.requires_permission(),
    }
}

/// Builds a `resources/list` entry for static resources.
fn resource_definition(capability: &RegisteredCapability) -> Option<ResourceDefinition> {
    let uri = capability.uri()?;
    Some(ResourceDefinition {
        uri: uri.to_string(),
        name: capability.name().as_str().to_string(),
        description: capability.descriptor().description.clone(),
        requires_permission: capability.requires_permission(),
    })
}

/// Builds a `resources/templates/list` entry for templated resources.
fn template_definition(capability: &RegisteredCapability) -> Option<ResourceTemplateDefinition> {
    let template = capability.uri_template()?;
    Some(ResourceTemplateDefinition {
        uri_template: template.as_str().to_string(),
        name: capability.name().as_str().to_string(),
        description: capability.descriptor().description.clone(),
        requires_permission: capability.requires_permission(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
