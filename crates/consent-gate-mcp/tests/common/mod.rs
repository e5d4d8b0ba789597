// crates/consent-gate-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared helpers for HTTP-level MCP server tests.
// Purpose: Start servers on ephemeral ports and issue JSON-RPC calls.
// Dependencies: consent-gate-core, consent-gate-config, consent-gate-mcp, reqwest
// ============================================================================

//! ## Overview
//! Provides configuration builders, token issuance, and a thin JSON-RPC client
//! for tests that drive a real listener.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;

use consent_gate_config::ConsentGateConfig;
use consent_gate_config::TokenAlgorithm;
use consent_gate_core::Clock;
use consent_gate_core::SystemClock;
use consent_gate_mcp::McpServer;
use consent_gate_mcp::TokenClaims;
use consent_gate_mcp::issue_token;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Shared HMAC secret for test servers.
pub const SECRET: &str = "http-test-secret";

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a config TOML with an inline key and the given extra sections.
pub fn config_toml(server_extra: &str, rest: &str) -> String {
    format!(
        r#"[server]
bind = "127.0.0.1:0"
{server_extra}

[server.audit]
enabled = false

[auth]
algorithm = "hs256"

[auth.key]
source = "inline"
value = "{SECRET}"

{rest}
"#
    )
}

/// Parses a test config.
pub fn config(server_extra: &str, rest: &str) -> ConsentGateConfig {
    ConsentGateConfig::from_toml_str(&config_toml(server_extra, rest)).unwrap()
}

/// Running test server.
pub struct TestServer {
    /// Endpoint URL.
    pub url: String,
    /// Server task.
    pub handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts a server on an ephemeral loopback port.
pub async fn spawn_server(config: ConsentGateConfig) -> TestServer {
    let server = McpServer::from_config(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });
    TestServer {
        url: format!("http://{addr}/mcp"),
        handle,
    }
}

/// Issues a one-hour token for `subject`.
pub fn token(subject: &str) -> String {
    let claims = TokenClaims::new(subject, SystemClock.now(), 3600);
    issue_token(TokenAlgorithm::Hs256, SECRET.as_bytes(), &claims).unwrap()
}

/// Sends a JSON-RPC call and returns the status and parsed body.
pub async fn rpc(
    url: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
    method: &str,
    params: Value,
) -> (StatusCode, Value) {
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
    let mut request = reqwest::Client::new().post(url).json(&body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = request.send().await.unwrap();
    let status = response.status();
    (status, response.json::<Value>().await.unwrap())
}
