// crates/consent-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Consent Gate configuration. The output always
//! parses and validates with [`crate::ConsentGateConfig::from_toml_str`].

/// Returns a canonical example `consent-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8001"
max_body_bytes = 1048576
# trusted_proxies = ["10.0.0.0/8"]

# [server.tls]
# cert_path = "/etc/consent-gate/server.crt"
# key_path = "/etc/consent-gate/server.key"

[server.audit]
enabled = true
# path = "/var/log/consent-gate/audit.jsonl"

[auth]
algorithm = "hs256"
# issuer = "https://issuer.example.com"
# audience = "consent-gate"
clock_skew_seconds = 0

[auth.key]
source = "env"
name = "MCP_SERVER_JWT_SECRET"

[origin]
allowlist = ["127.0.0.1", "::1"]

[confirmation]
ttl_seconds = 300
allow_cross_identity = false
sweep_interval_seconds = 30
retention_seconds = 86400

[confirmation.store]
type = "sqlite"
path = "consent-gate.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[capabilities]
builtin_catalog = true

[capabilities.defaults]
tool_requires_permission = true
resource_requires_permission = false

[[capabilities.overrides]]
kind = "tool"
name = "add_two_numbers"
requires_permission = false
"#,
    )
}
