// crates/consent-gate-mcp/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for gateway request handling.
// Purpose: Emit redacted JSON-line audit records without hard dependencies.
// Dependencies: consent-gate-core, serde
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for the gateway. Every
//! JSON-RPC request produces one [`GatewayAuditEvent`]; confirmation resolves
//! and background sweeps produce their own events. Raw bearer tokens and raw
//! confirmation tokens never appear in an event: identities are recorded by
//! subject and token fingerprint, confirmations by a short digest reference.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use consent_gate_core::ConfirmationDecision;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Decision recorded for a gateway request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    /// Request completed.
    Allow,
    /// Capability parked awaiting confirmation.
    Pending,
    /// Origin, token, or identity check refused the request.
    Deny,
    /// Request failed after authentication.
    Error,
}

/// Gateway request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Resolved client address when available.
    pub peer_ip: Option<String>,
    /// JSON-RPC method.
    pub method: String,
    /// Capability name or resource URI when the method targets one.
    pub capability: Option<String>,
    /// Request decision.
    pub decision: AuditDecision,
    /// Verified token subject.
    pub subject: Option<String>,
    /// SHA-256 fingerprint of the bearer token.
    pub token_fingerprint: Option<String>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Inputs for building a gateway request audit event.
#[derive(Debug, Clone)]
pub struct GatewayAuditEventParams {
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Resolved client address when available.
    pub peer_ip: Option<String>,
    /// JSON-RPC method.
    pub method: String,
    /// Capability name or resource URI.
    pub capability: Option<String>,
    /// Request decision.
    pub decision: AuditDecision,
    /// Verified token subject.
    pub subject: Option<String>,
    /// Bearer token fingerprint.
    pub token_fingerprint: Option<String>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Confirmation resolve audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Confirmation token digest prefix.
    pub reference: String,
    /// Decision presented by the caller.
    pub decision: ConfirmationDecision,
    /// Outcome label (`approved`, `denied`, or `error`).
    pub outcome: &'static str,
    /// Resolving subject.
    pub subject: String,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Inputs for building a confirmation resolve audit event.
#[derive(Debug, Clone)]
pub struct ConfirmationAuditEventParams {
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Confirmation token digest prefix.
    pub reference: String,
    /// Decision presented by the caller.
    pub decision: ConfirmationDecision,
    /// Outcome label.
    pub outcome: &'static str,
    /// Resolving subject.
    pub subject: String,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Background sweep audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SweepAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Pending records moved to expired.
    pub expired: usize,
    /// Resolved records removed past retention.
    pub purged: usize,
    /// Normalized error kind label when the sweep failed.
    pub error_kind: Option<&'static str>,
}

impl GatewayAuditEvent {
    /// Creates a new gateway request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: GatewayAuditEventParams) -> Self {
        Self {
            event: "gateway_request",
            timestamp_ms: now_millis(),
            request_id: params.request_id,
            peer_ip: params.peer_ip,
            method: params.method,
            capability: params.capability,
            decision: params.decision,
            subject: params.subject,
            token_fingerprint: params.token_fingerprint,
            error_kind: params.error_kind,
        }
    }
}

impl ConfirmationAuditEvent {
    /// Creates a new confirmation audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: ConfirmationAuditEventParams) -> Self {
        Self {
            event: "confirmation_resolved",
            timestamp_ms: now_millis(),
            request_id: params.request_id,
            reference: params.reference,
            decision: params.decision,
            outcome: params.outcome,
            subject: params.subject,
            error_kind: params.error_kind,
        }
    }
}

impl SweepAuditEvent {
    /// Creates a new sweep audit event with a consistent timestamp.
    #[must_use]
    pub fn new(expired: usize, purged: usize, error_kind: Option<&'static str>) -> Self {
        Self {
            event: "confirmation_sweep",
            timestamp_ms: now_millis(),
            expired,
            purged,
            error_kind,
        }
    }
}

/// Returns wall-clock milliseconds since the epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gateway events.
pub trait AuditSink: Send + Sync {
    /// Record a gateway request event.
    fn record(&self, event: &GatewayAuditEvent);

    /// Record a confirmation resolve event.
    fn record_confirmation(&self, _event: &ConfirmationAuditEvent) {}

    /// Record a background sweep event.
    fn record_sweep(&self, _event: &SweepAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_confirmation(&self, event: &ConfirmationAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_sweep(&self, event: &SweepAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event line.
    fn append(&self, event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        self.append(event);
    }

    fn record_confirmation(&self, event: &ConfirmationAuditEvent) {
        self.append(event);
    }

    fn record_sweep(&self, event: &SweepAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &GatewayAuditEvent) {}

    fn record_confirmation(&self, _event: &ConfirmationAuditEvent) {}

    fn record_sweep(&self, _event: &SweepAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
