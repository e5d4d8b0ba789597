//! Auth configuration validation tests for consent-gate-config.
// crates/consent-gate-config/tests/auth_validation.rs
// =============================================================================
// Module: Auth Validation Tests
// Description: Validate token verification settings.
// Purpose: Ensure key sources, claims, and time settings fail closed.
// =============================================================================

use consent_gate_config::ConsentGateConfig;
use consent_gate_config::KeySourceConfig;
use consent_gate_config::TokenAlgorithm;

mod common;

use crate::common::TestResult;
use crate::common::assert_invalid;

#[test]
fn inline_key_must_not_be_blank() -> TestResult {
    let toml = "[auth.key]\nsource = \"inline\"\nvalue = \"  \"\n";
    assert_invalid(ConsentGateConfig::from_toml_str(toml), "auth.key.value")
}

#[test]
fn env_key_defaults_variable_name() -> TestResult {
    let config = ConsentGateConfig::from_toml_str("[auth.key]\nsource = \"env\"\n")
        .map_err(|err| err.to_string())?;
    match config.auth.key {
        KeySourceConfig::Env {
            name,
        } if name == "MCP_SERVER_JWT_SECRET" => Ok(()),
        other => Err(format!("unexpected key source {other:?}")),
    }
}

#[test]
fn env_key_name_must_be_identifier() -> TestResult {
    let toml = "[auth.key]\nsource = \"env\"\nname = \"BAD-NAME\"\n";
    assert_invalid(ConsentGateConfig::from_toml_str(toml), "auth.key.name")
}

#[test]
fn url_key_requires_https() -> TestResult {
    let toml = "[auth.key]\nsource = \"url\"\nurl = \"http://keys.example.com/key.pem\"\n";
    assert_invalid(ConsentGateConfig::from_toml_str(toml), "must use https")?;
    let allowed = format!("[auth]\nallow_insecure_key_url = true\n{toml}");
    ConsentGateConfig::from_toml_str(&allowed).map_err(|err| err.to_string())?;
    let ftp = "[auth.key]\nsource = \"url\"\nurl = \"ftp://keys.example.com/key.pem\"\n";
    assert_invalid(ConsentGateConfig::from_toml_str(ftp), "unsupported scheme")
}

#[test]
fn file_key_and_asymmetric_algorithm_parse() -> TestResult {
    let toml = "[auth]\nalgorithm = \"rs256\"\nissuer = \"https://issuer.example.com\"\n\
                audience = \"consent-gate\"\n[auth.key]\nsource = \"file\"\npath = \"keys/public.pem\"\n";
    let config = ConsentGateConfig::from_toml_str(toml).map_err(|err| err.to_string())?;
    if config.auth.algorithm != TokenAlgorithm::Rs256 || config.auth.algorithm.is_symmetric() {
        return Err("expected rs256".to_string());
    }
    if config.auth.key.label() != "file" {
        return Err("expected file key source".to_string());
    }
    Ok(())
}

#[test]
fn unknown_algorithm_is_rejected() -> TestResult {
    assert_invalid(ConsentGateConfig::from_toml_str("[auth]\nalgorithm = \"none\"\n"), "unknown variant")
}

#[test]
fn clock_skew_is_capped() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.clock_skew_seconds = 300;
    config.validate().map_err(|err| err.to_string())?;
    config.auth.clock_skew_seconds = 301;
    assert_invalid(config.validate(), "auth.clock_skew_seconds")
}

#[test]
fn claims_must_be_non_empty_when_set() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.issuer = Some(String::new());
    assert_invalid(config.validate(), "auth.issuer")?;
    config.auth.issuer = None;
    config.auth.audience = Some(" ".to_string());
    assert_invalid(config.validate(), "auth.audience")
}

#[test]
fn key_fetch_settings_are_bounded() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.key_cache_ttl_seconds = 0;
    assert_invalid(config.validate(), "auth.key_cache_ttl_seconds")?;
    config.auth.key_cache_ttl_seconds = 60;
    config.auth.key_fetch_timeout_ms = 10;
    assert_invalid(config.validate(), "auth.key_fetch_timeout_ms")
}
