//! Config file loading tests for consent-gate-config.
// crates/consent-gate-config/tests/load_validation.rs
// =============================================================================
// Module: Load Validation Tests
// Description: Validate config file resolution and file-level limits.
// Purpose: Ensure oversized, non-UTF-8, and missing files fail closed.
// =============================================================================

use std::fs;

use consent_gate_config::ConfigError;
use consent_gate_config::ConsentGateConfig;
use consent_gate_config::config_toml_example;
use tempfile::TempDir;

mod common;

use crate::common::TestResult;
use crate::common::assert_invalid;

#[test]
fn load_reads_explicit_path() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("consent-gate.toml");
    fs::write(&path, config_toml_example()).map_err(|err| err.to_string())?;
    let config = ConsentGateConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.source_modified_at.is_none() {
        return Err("expected source modification time".to_string());
    }
    Ok(())
}

#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    match ConsentGateConfig::load(Some(&temp.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("big.toml");
    let padding = "#".repeat(1024 * 1024 + 1);
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    assert_invalid(ConsentGateConfig::load(Some(&path)), "size limit")
}

#[test]
fn load_rejects_non_utf8() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("binary.toml");
    fs::write(&path, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(ConsentGateConfig::load(Some(&path)), "utf-8")
}

#[test]
fn load_reports_parse_errors() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("broken.toml");
    fs::write(&path, "[server\nbind = 1").map_err(|err| err.to_string())?;
    match ConsentGateConfig::load(Some(&path)) {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn sqlite_store_path_must_not_be_directory() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let toml = format!(
        "[confirmation.store]\ntype = \"sqlite\"\npath = {:?}\n",
        temp.path().display().to_string()
    );
    assert_invalid(ConsentGateConfig::from_toml_str(&toml), "must be a file")
}
