// crates/consent-gate-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: JSON-RPC 2.0 HTTP server over the Consent Gate router.
// Purpose: Expose capability calls and confirmation round trips via HTTP(S).
// Dependencies: consent-gate-core, consent-gate-config, axum, axum-server, tokio
// ============================================================================

//! ## Overview
//! The MCP server serves `POST /mcp` and always routes calls through
//! [`crate::router::GatewayRouter`]. The client address comes from the socket
//! unless the socket peer is a trusted proxy, in which case the right-most
//! untrusted `X-Forwarded-For` entry is used. A background task expires
//! lapsed confirmations and purges resolved ones past retention.
//!
//! Security posture: request bodies, headers, and forwarded addresses are
//! untrusted; an unparsable forwarded chain leaves the client address unknown
//! so a populated allowlist rejects it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::routing::post;
use axum_server::tls_rustls::RustlsConfig;
use consent_gate_config::ConfirmationStoreType;
use consent_gate_config::ConsentGateConfig;
use consent_gate_core::AllowlistEntry;
use consent_gate_core::CapabilityDescriptor;
use consent_gate_core::ConfirmationBroker;
use consent_gate_core::Gateway;
use consent_gate_core::GatewayError;
use consent_gate_core::InMemoryConfirmationStore;
use consent_gate_core::SharedConfirmationStore;
use consent_gate_core::SystemClock;
use consent_gate_core::canonical_ip;
use consent_gate_store_sqlite::SqliteConfirmationStore;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::SweepAuditEvent;
use crate::auth::JwtTokenVerifier;
use crate::auth::RequestContext;
use crate::catalog::build_registry;
use crate::router::GatewayRouter;
use crate::router::RouterError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON-RPC endpoint path.
pub const MCP_PATH: &str = "/mcp";

/// Forwarded-for header consulted for trusted proxies.
const X_FORWARDED_FOR: &str = "x-forwarded-for";

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: ConsentGateConfig,
    /// Method router.
    router: GatewayRouter,
    /// Parsed trusted proxy ranges.
    trusted_proxies: Vec<AllowlistEntry>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when initialization fails.
    pub fn from_config(config: ConsentGateConfig) -> Result<Self, McpServerError> {
        Self::with_capabilities(config, Vec::new())
    }

    /// Builds a server that registers `extra` alongside the configured catalog.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when validation, registration, key loading,
    /// or store initialization fails.
    pub fn with_capabilities(
        mut config: ConsentGateConfig,
        extra: Vec<CapabilityDescriptor>,
    ) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let registry = Arc::new(
            build_registry(&config.capabilities, extra)
                .map_err(|err| McpServerError::Init(err.to_string()))?,
        );
        let clock = Arc::new(SystemClock);
        let verifier = JwtTokenVerifier::from_config(&config.auth, clock.clone())
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let origin =
            config.origin.filter().map_err(|err| McpServerError::Config(err.to_string()))?;
        let trusted_proxies = config
            .server
            .trusted_proxy_entries()
            .map_err(|err| McpServerError::Config(err.to_string()))?;
        let store = build_confirmation_store(&config)?;
        let broker = ConfirmationBroker::new(store, Arc::clone(&registry), clock)
            .with_ttl_seconds(config.confirmation.ttl_seconds)
            .with_cross_identity(config.confirmation.allow_cross_identity);
        let gateway = Gateway::new(origin, Arc::new(verifier), registry, broker);
        let audit = build_audit_sink(&config)?;
        Ok(Self {
            config,
            router: GatewayRouter::new(gateway, audit),
            trusted_proxies,
        })
    }

    /// Returns the method router.
    #[must_use]
    pub const fn router(&self) -> &GatewayRouter {
        &self.router
    }

    /// Binds the configured address and serves requests until failure.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
        if let Some(tls) = self.config.server.tls.clone() {
            let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|err| McpServerError::Init(format!("tls config failed: {err}")))?;
            let sweeper = self.spawn_sweeper();
            let app = self.into_app();
            let result = axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .map_err(|_| McpServerError::Transport("https server failed".to_string()));
            sweeper.abort();
            return result;
        }
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
        self.serve_with_listener(listener).await
    }

    /// Serves plain HTTP on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the server fails.
    pub async fn serve_with_listener(self, listener: TcpListener) -> Result<(), McpServerError> {
        let sweeper = self.spawn_sweeper();
        let app = self.into_app();
        let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| McpServerError::Transport("http server failed".to_string()));
        sweeper.abort();
        result
    }

    /// Builds the axum application.
    fn into_app(self) -> Router {
        let max_body_bytes = self.config.server.max_body_bytes;
        let state = Arc::new(ServerState {
            router: self.router,
            max_body_bytes,
            trusted_proxies: self.trusted_proxies,
        });
        Router::new()
            .route(MCP_PATH, post(handle_http))
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .with_state(state)
    }

    /// Starts the background confirmation sweeper.
    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let broker = self.router.gateway().broker().clone();
        let audit = self.router.audit();
        let period = Duration::from_secs(self.config.confirmation.sweep_interval_seconds.max(1));
        let retention_seconds = self.config.confirmation.retention_seconds;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let broker = broker.clone();
                let swept =
                    tokio::task::spawn_blocking(move || sweep_once(&broker, retention_seconds))
                        .await;
                if let Ok(Some(event)) = swept {
                    audit.record_sweep(&event);
                }
            }
        })
    }
}

/// Runs one sweep; returns an event when anything changed or failed.
fn sweep_once(broker: &ConfirmationBroker, retention_seconds: u64) -> Option<SweepAuditEvent> {
    let expired = match broker.sweep_expired() {
        Ok(count) => count,
        Err(err) => return Some(SweepAuditEvent::new(0, 0, Some(err.code()))),
    };
    let purged = match broker.purge_resolved(retention_seconds) {
        Ok(count) => count,
        Err(err) => return Some(SweepAuditEvent::new(expired, 0, Some(err.code()))),
    };
    (expired > 0 || purged > 0).then(|| SweepAuditEvent::new(expired, purged, None))
}

/// Builds the confirmation store from configuration.
fn build_confirmation_store(
    config: &ConsentGateConfig,
) -> Result<SharedConfirmationStore, McpServerError> {
    let store = match config.confirmation.store.store_type {
        ConfirmationStoreType::Memory => {
            SharedConfirmationStore::from_store(InMemoryConfirmationStore::new())
        }
        ConfirmationStoreType::Sqlite => {
            let sqlite_config = config.confirmation.store.sqlite_config().ok_or_else(|| {
                McpServerError::Config("sqlite confirmation store requires path".to_string())
            })?;
            let store = SqliteConfirmationStore::new(sqlite_config)
                .map_err(|err| McpServerError::Init(err.to_string()))?;
            SharedConfirmationStore::from_store(store)
        }
    };
    Ok(store)
}

/// Builds the audit sink from configuration.
fn build_audit_sink(config: &ConsentGateConfig) -> Result<Arc<dyn AuditSink>, McpServerError> {
    if !config.server.audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.server.audit.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| McpServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared server state for HTTP handlers.
struct ServerState {
    /// Method router.
    router: GatewayRouter,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
    /// Trusted proxy ranges.
    trusted_proxies: Vec<AllowlistEntry>,
}

/// Handles HTTP JSON-RPC requests.
async fn handle_http(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let context = http_request_context(peer, &headers, &state.trusted_proxies);
    let (status, response) = parse_request(&state, &context, &bytes);
    (status, axum::Json(response))
}

/// Builds the request context from the socket peer and headers.
fn http_request_context(
    peer: SocketAddr,
    headers: &HeaderMap,
    trusted_proxies: &[AllowlistEntry],
) -> RequestContext {
    let auth_header =
        headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(str::to_string);
    RequestContext::http(client_ip(peer.ip(), headers, trusted_proxies), auth_header)
}

/// Resolves the client address, honoring `X-Forwarded-For` from trusted
/// proxies only.
fn client_ip(
    peer: IpAddr,
    headers: &HeaderMap,
    trusted_proxies: &[AllowlistEntry],
) -> Option<IpAddr> {
    let peer = canonical_ip(peer);
    let is_trusted = |addr: IpAddr| trusted_proxies.iter().any(|entry| entry.contains(addr));
    if !is_trusted(peer) {
        return Some(peer);
    }
    let mut hops = Vec::new();
    for value in headers.get_all(X_FORWARDED_FOR) {
        let value = value.to_str().ok()?;
        hops.extend(value.split(',').map(str::trim));
    }
    let mut client = peer;
    for hop in hops.into_iter().rev() {
        let addr = canonical_ip(hop.parse::<IpAddr>().ok()?);
        client = addr;
        if !is_trusted(addr) {
            break;
        }
    }
    Some(client)
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier.
    #[serde(default)]
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
    /// Structured error details.
    data: Value,
}

/// Dispatches a JSON-RPC request to the router.
fn handle_request(
    router: &GatewayRouter,
    base_context: &RequestContext,
    request: JsonRpcRequest,
) -> (StatusCode, JsonRpcResponse) {
    let context = base_context.clone().with_request_id(request.id.to_string());
    if request.jsonrpc != "2.0" {
        return protocol_error(
            request.id,
            StatusCode::BAD_REQUEST,
            -32600,
            "invalid json-rpc version",
            "invalid_request",
        );
    }
    match dispatch_with_blocking(router, &context, &request.method, request.params) {
        Ok(result) => (
            StatusCode::OK,
            JsonRpcResponse {
                jsonrpc: "2.0",
                id: request.id,
                result: Some(result),
                error: None,
            },
        ),
        Err(err) => jsonrpc_error(request.id, &err),
    }
}

/// Dispatches a request, shifting to a blocking context when available.
fn dispatch_with_blocking(
    router: &GatewayRouter,
    context: &RequestContext,
    method: &str,
    params: Option<Value>,
) -> Result<Value, RouterError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| router.dispatch(context, method, params))
        }
        _ => router.dispatch(context, method, params),
    }
}

/// Parses and validates a JSON-RPC request payload.
fn parse_request(
    state: &ServerState,
    context: &RequestContext,
    bytes: &Bytes,
) -> (StatusCode, JsonRpcResponse) {
    if bytes.len() > state.max_body_bytes {
        return protocol_error(
            Value::Null,
            StatusCode::PAYLOAD_TOO_LARGE,
            -32600,
            "request body too large",
            "payload_too_large",
        );
    }
    let Ok(payload) = serde_json::from_slice::<Value>(bytes.as_ref()) else {
        return protocol_error(
            Value::Null,
            StatusCode::BAD_REQUEST,
            -32700,
            "parse error",
            "parse_error",
        );
    };
    match serde_json::from_value::<JsonRpcRequest>(payload) {
        Ok(request) => handle_request(&state.router, context, request),
        Err(_) => protocol_error(
            Value::Null,
            StatusCode::BAD_REQUEST,
            -32600,
            "invalid json-rpc request",
            "invalid_request",
        ),
    }
}

/// Builds a protocol-level error response.
fn protocol_error(
    id: Value,
    status: StatusCode,
    code: i64,
    message: &str,
    kind: &str,
) -> (StatusCode, JsonRpcResponse) {
    (
        status,
        JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: json!({"errorKind": kind}),
            }),
        },
    )
}

/// Builds a JSON-RPC error response for a router failure.
fn jsonrpc_error(id: Value, error: &RouterError) -> (StatusCode, JsonRpcResponse) {
    let (status, code, message) = match error {
        RouterError::MethodNotFound(_) => {
            (StatusCode::BAD_REQUEST, -32601, "method not found".to_string())
        }
        RouterError::InvalidParams(message) => (StatusCode::BAD_REQUEST, -32602, message.clone()),
        RouterError::Gateway(err) => match err {
            GatewayError::Auth(_) => (StatusCode::UNAUTHORIZED, -32001, err.to_string()),
            GatewayError::OriginDenied | GatewayError::IdentityMismatch => {
                (StatusCode::FORBIDDEN, -32003, err.to_string())
            }
            GatewayError::InvalidArguments(_) => (StatusCode::BAD_REQUEST, -32602, err.to_string()),
            GatewayError::NotFound(_) | GatewayError::UnknownConfirmation => {
                (StatusCode::OK, -32004, err.to_string())
            }
            GatewayError::AlreadyResolved | GatewayError::ConfirmationExpired => {
                (StatusCode::OK, -32009, err.to_string())
            }
            GatewayError::CapabilityExecutionFailed(_) => {
                (StatusCode::OK, -32010, err.to_string())
            }
            GatewayError::DuplicateCapability(_)
            | GatewayError::AmbiguousTemplate(_)
            | GatewayError::InvalidRegistration(_)
            | GatewayError::Store(_) => (StatusCode::OK, -32603, "internal error".to_string()),
        },
    };
    (
        status,
        JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: json!({"errorKind": error.kind()}),
            }),
        },
    )
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
