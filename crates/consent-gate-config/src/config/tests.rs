// crates/consent-gate-config/src/config/tests.rs
// ============================================================================
// Module: Config Helper Tests
// Description: Unit tests for private validation helpers.
// Purpose: Pin boundary behavior of range, path, and name checks.
// Dependencies: consent-gate-config
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use super::*;

#[test]
fn validate_range_accepts_exact_boundaries() {
    assert!(validate_range("test", 100, 100, 1000).is_ok());
    assert!(validate_range("test", 1000, 100, 1000).is_ok());
    assert!(validate_range("test", 99, 100, 1000).is_err());
    assert!(validate_range("test", 1001, 100, 1000).is_err());
}

#[test]
fn validate_path_string_rejects_blank_and_overlong() {
    assert!(validate_path_string("p", "./certs/server.pem").is_ok());
    assert!(validate_path_string("p", "   ").is_err());
    let long_component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
    let err = validate_path_string("tls.cert_path", &long_component).unwrap_err();
    assert!(err.to_string().contains("tls.cert_path"));
    let long_total = "a/".repeat(MAX_TOTAL_PATH_LENGTH);
    assert!(validate_path_string("p", &long_total).is_err());
}

#[test]
fn validate_env_name_requires_identifier_shape() {
    assert!(validate_env_name("MCP_SERVER_JWT_SECRET").is_ok());
    assert!(validate_env_name("_X1").is_ok());
    assert!(validate_env_name("").is_err());
    assert!(validate_env_name("1ABC").is_err());
    assert!(validate_env_name("BAD-NAME").is_err());
}

#[test]
fn resolve_path_prefers_explicit_path() {
    let path = resolve_path(Some(Path::new("custom.toml"))).unwrap();
    assert_eq!(path, PathBuf::from("custom.toml"));
}

#[test]
fn validate_path_rejects_long_component() {
    let long = "c".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
    assert!(validate_path(Path::new(&long)).is_err());
    assert!(validate_path(Path::new("consent-gate.toml")).is_ok());
}
