// crates/consent-gate-config/src/config.rs
// ============================================================================
// Module: Consent Gate Configuration
// Description: Configuration loading and validation for Consent Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: consent-gate-core, consent-gate-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file yields a loopback server with
//! an in-memory confirmation store and the demo catalog. Missing or invalid
//! configuration fails closed.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use consent_gate_core::AllowlistEntry;
use consent_gate_core::CapabilityKind;
use consent_gate_core::OriginFilter;
use consent_gate_core::PermissionDefaults;
use consent_gate_store_sqlite::SqliteStoreConfig;
use consent_gate_store_sqlite::SqliteStoreMode;
use consent_gate_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "consent-gate.toml";
/// Environment variable used to locate the config file.
pub const CONFIG_ENV_VAR: &str = "CONSENT_GATE_CONFIG";
/// Maximum config file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8001";
/// Default maximum request body size.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Upper bound for `max_body_bytes`.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Default environment variable holding the token secret.
pub const DEFAULT_KEY_ENV: &str = "MCP_SERVER_JWT_SECRET";
/// Maximum allowed clock skew in seconds.
pub(crate) const MAX_CLOCK_SKEW_SECONDS: u64 = 300;
/// Default key cache TTL in seconds.
pub(crate) const DEFAULT_KEY_CACHE_TTL_SECONDS: u64 = 300;
/// Maximum key cache TTL in seconds.
pub(crate) const MAX_KEY_CACHE_TTL_SECONDS: u64 = 86_400;
/// Default key fetch timeout in milliseconds.
pub(crate) const DEFAULT_KEY_FETCH_TIMEOUT_MS: u64 = 5_000;
/// Minimum key fetch timeout in milliseconds.
pub(crate) const MIN_KEY_FETCH_TIMEOUT_MS: u64 = 100;
/// Maximum key fetch timeout in milliseconds.
pub(crate) const MAX_KEY_FETCH_TIMEOUT_MS: u64 = 30_000;
/// Maximum number of origin allowlist entries.
pub(crate) const MAX_ALLOWLIST_ENTRIES: usize = 1_024;
/// Maximum number of trusted proxy entries.
pub(crate) const MAX_TRUSTED_PROXIES: usize = 64;
/// Default confirmation TTL in seconds.
pub(crate) const DEFAULT_CONFIRMATION_TTL_SECONDS: u64 = 300;
/// Maximum confirmation TTL in seconds.
pub(crate) const MAX_CONFIRMATION_TTL_SECONDS: u64 = 86_400;
/// Default sweep interval in seconds.
pub(crate) const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;
/// Maximum sweep interval in seconds.
pub(crate) const MAX_SWEEP_INTERVAL_SECONDS: u64 = 3_600;
/// Default retention for resolved confirmations in seconds.
pub(crate) const DEFAULT_RETENTION_SECONDS: u64 = 86_400;
/// Maximum retention for resolved confirmations in seconds.
pub(crate) const MAX_RETENTION_SECONDS: u64 = 30 * 86_400;
/// Default store busy timeout in milliseconds.
pub(crate) const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum number of capability overrides.
pub(crate) const MAX_CAPABILITY_OVERRIDES: usize = 256;
/// Maximum capability name length in overrides.
pub(crate) const MAX_CAPABILITY_NAME_LENGTH: usize = 512;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Consent Gate server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsentGateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Token verification configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Origin allowlist configuration.
    #[serde(default)]
    pub origin: OriginConfig,
    /// Confirmation broker configuration.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    /// Capability registration configuration.
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    /// Optional config source metadata (not serialized).
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl ConsentGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.origin.validate()?;
        self.confirmation.validate()?;
        self.capabilities.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Proxy networks whose `X-Forwarded-For` header is honored.
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    /// Optional TLS configuration.
    #[serde(default)]
    pub tls: Option<ServerTlsConfig>,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            trusted_proxies: Vec::new(),
            tls: None,
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind address is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))
    }

    /// Returns the parsed trusted proxy networks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an entry is malformed.
    pub fn trusted_proxy_entries(&self) -> Result<Vec<AllowlistEntry>, ConfigError> {
        self.trusted_proxies
            .iter()
            .map(|entry| {
                AllowlistEntry::parse(entry).map_err(|err| {
                    ConfigError::Invalid(format!("server.trusted_proxies: {err}"))
                })
            })
            .collect()
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "max_body_bytes exceeds limit ({MAX_MAX_BODY_BYTES})"
            )));
        }
        if self.trusted_proxies.len() > MAX_TRUSTED_PROXIES {
            return Err(ConfigError::Invalid("too many server.trusted_proxies".to_string()));
        }
        self.trusted_proxy_entries()?;
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        self.audit.validate()?;
        Ok(())
    }
}

/// TLS configuration for the HTTP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerTlsConfig {
    /// Server certificate chain (PEM).
    pub cert_path: String,
    /// Server private key (PEM).
    pub key_path: String,
}

impl ServerTlsConfig {
    /// Validates TLS configuration paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("tls.cert_path", &self.cert_path)?;
        validate_path_string("tls.key_path", &self.key_path)?;
        Ok(())
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Token signature algorithms accepted by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenAlgorithm {
    /// HMAC with SHA-256.
    #[default]
    Hs256,
    /// HMAC with SHA-384.
    Hs384,
    /// HMAC with SHA-512.
    Hs512,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
    /// ECDSA P-256 with SHA-256.
    Es256,
}

impl TokenAlgorithm {
    /// Returns true for shared-secret algorithms.
    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        matches!(self, Self::Hs256 | Self::Hs384 | Self::Hs512)
    }

    /// Returns the JOSE `alg` label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
        }
    }
}

/// Where verification key material comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySourceConfig {
    /// Key material embedded in the config file.
    Inline {
        /// Secret or PEM text.
        value: String,
    },
    /// Key material read from an environment variable at startup.
    Env {
        /// Variable name.
        #[serde(default = "default_key_env")]
        name: String,
    },
    /// Key material read from a file at startup.
    File {
        /// File path.
        path: String,
    },
    /// Key material fetched over HTTPS and cached.
    Url {
        /// Key URL.
        url: String,
    },
}

impl Default for KeySourceConfig {
    fn default() -> Self {
        Self::Env {
            name: default_key_env(),
        }
    }
}

impl KeySourceConfig {
    /// Returns a stable label for this source.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Inline {
                ..
            } => "inline",
            Self::Env {
                ..
            } => "env",
            Self::File {
                ..
            } => "file",
            Self::Url {
                ..
            } => "url",
        }
    }
}

/// Token verification configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Signature algorithm.
    #[serde(default)]
    pub algorithm: TokenAlgorithm,
    /// Verification key source.
    #[serde(default)]
    pub key: KeySourceConfig,
    /// Required `iss` claim value.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Required `aud` claim member.
    #[serde(default)]
    pub audience: Option<String>,
    /// Allowed clock skew in seconds.
    #[serde(default)]
    pub clock_skew_seconds: u64,
    /// Cache TTL for URL-sourced keys.
    #[serde(default = "default_key_cache_ttl_seconds")]
    pub key_cache_ttl_seconds: u64,
    /// Fetch timeout for URL-sourced keys.
    #[serde(default = "default_key_fetch_timeout_ms")]
    pub key_fetch_timeout_ms: u64,
    /// Permit `http://` key URLs (testing only).
    #[serde(default)]
    pub allow_insecure_key_url: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: TokenAlgorithm::default(),
            key: KeySourceConfig::default(),
            issuer: None,
            audience: None,
            clock_skew_seconds: 0,
            key_cache_ttl_seconds: default_key_cache_ttl_seconds(),
            key_fetch_timeout_ms: default_key_fetch_timeout_ms(),
            allow_insecure_key_url: false,
        }
    }
}

impl AuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match &self.key {
            KeySourceConfig::Inline {
                value,
            } => {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid("auth.key.value must be non-empty".to_string()));
                }
            }
            KeySourceConfig::Env {
                name,
            } => validate_env_name(name)?,
            KeySourceConfig::File {
                path,
            } => validate_path_string("auth.key.path", path)?,
            KeySourceConfig::Url {
                url,
            } => self.validate_key_url(url)?,
        }
        if let Some(issuer) = &self.issuer
            && issuer.trim().is_empty()
        {
            return Err(ConfigError::Invalid("auth.issuer must be non-empty".to_string()));
        }
        if let Some(audience) = &self.audience
            && audience.trim().is_empty()
        {
            return Err(ConfigError::Invalid("auth.audience must be non-empty".to_string()));
        }
        if self.clock_skew_seconds > MAX_CLOCK_SKEW_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "auth.clock_skew_seconds exceeds limit ({MAX_CLOCK_SKEW_SECONDS})"
            )));
        }
        validate_range(
            "auth.key_cache_ttl_seconds",
            self.key_cache_ttl_seconds,
            1,
            MAX_KEY_CACHE_TTL_SECONDS,
        )?;
        validate_range(
            "auth.key_fetch_timeout_ms",
            self.key_fetch_timeout_ms,
            MIN_KEY_FETCH_TIMEOUT_MS,
            MAX_KEY_FETCH_TIMEOUT_MS,
        )?;
        Ok(())
    }

    /// Validates a key URL.
    fn validate_key_url(&self, raw: &str) -> Result<(), ConfigError> {
        let url = Url::parse(raw)
            .map_err(|err| ConfigError::Invalid(format!("auth.key.url is invalid: {err}")))?;
        match url.scheme() {
            "https" => Ok(()),
            "http" if self.allow_insecure_key_url => Ok(()),
            "http" => Err(ConfigError::Invalid(
                "auth.key.url must use https unless allow_insecure_key_url is set".to_string(),
            )),
            other => Err(ConfigError::Invalid(format!("auth.key.url has unsupported scheme: {other}"))),
        }
    }
}

// ============================================================================
// SECTION: Origin
// ============================================================================

/// Origin allowlist configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OriginConfig {
    /// Allowed client addresses or CIDR networks. Empty allows every origin.
    #[serde(default)]
    pub allowlist: Vec<String>,
}

impl OriginConfig {
    /// Builds the origin filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an entry is malformed.
    pub fn filter(&self) -> Result<OriginFilter, ConfigError> {
        OriginFilter::parse(&self.allowlist)
            .map_err(|err| ConfigError::Invalid(format!("origin.allowlist: {err}")))
    }

    /// Validates origin configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.allowlist.len() > MAX_ALLOWLIST_ENTRIES {
            return Err(ConfigError::Invalid("too many origin.allowlist entries".to_string()));
        }
        self.filter()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Confirmation
// ============================================================================

/// Confirmation broker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmationConfig {
    /// Lifetime of a pending confirmation.
    #[serde(default = "default_confirmation_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Allow any authenticated identity to resolve a confirmation.
    #[serde(default)]
    pub allow_cross_identity: bool,
    /// Interval between expiry sweeps.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// How long resolved records are kept before purge.
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,
    /// Store backend.
    #[serde(default)]
    pub store: ConfirmationStoreConfig,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_confirmation_ttl_seconds(),
            allow_cross_identity: false,
            sweep_interval_seconds: default_sweep_interval_seconds(),
            retention_seconds: default_retention_seconds(),
            store: ConfirmationStoreConfig::default(),
        }
    }
}

impl ConfirmationConfig {
    /// Validates confirmation configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range("confirmation.ttl_seconds", self.ttl_seconds, 1, MAX_CONFIRMATION_TTL_SECONDS)?;
        validate_range(
            "confirmation.sweep_interval_seconds",
            self.sweep_interval_seconds,
            1,
            MAX_SWEEP_INTERVAL_SECONDS,
        )?;
        validate_range(
            "confirmation.retention_seconds",
            self.retention_seconds,
            0,
            MAX_RETENTION_SECONDS,
        )?;
        self.store.validate()
    }
}

/// Confirmation store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use `SQLite`-backed durable store.
    Sqlite,
}

/// Confirmation store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmationStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: ConfirmationStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for ConfirmationStoreConfig {
    fn default() -> Self {
        Self {
            store_type: ConfirmationStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl ConfirmationStoreConfig {
    /// Returns the `SQLite` store config for the sqlite backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (ConfirmationStoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            ConfirmationStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory confirmation.store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            ConfirmationStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite confirmation.store requires path".to_string())
                })?;
                validate_store_path(path)
            }
        }
    }
}

// ============================================================================
// SECTION: Capabilities
// ============================================================================

/// Capability registration configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilitiesConfig {
    /// Register the built-in demo catalog.
    #[serde(default = "default_builtin_catalog")]
    pub builtin_catalog: bool,
    /// Per-kind confirmation defaults.
    #[serde(default)]
    pub defaults: PermissionDefaultsConfig,
    /// Per-capability confirmation overrides.
    #[serde(default)]
    pub overrides: Vec<CapabilityOverride>,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            builtin_catalog: default_builtin_catalog(),
            defaults: PermissionDefaultsConfig::default(),
            overrides: Vec::new(),
        }
    }
}

impl CapabilitiesConfig {
    /// Returns the registry permission defaults.
    #[must_use]
    pub const fn permission_defaults(&self) -> PermissionDefaults {
        PermissionDefaults {
            tool_requires_permission: self.defaults.tool_requires_permission,
            resource_requires_permission: self.defaults.resource_requires_permission,
        }
    }

    /// Returns the override for a capability, if configured.
    #[must_use]
    pub fn override_for(&self, kind: CapabilityKind, name: &str) -> Option<bool> {
        self.overrides
            .iter()
            .find(|entry| entry.kind == kind && entry.name == name)
            .map(|entry| entry.requires_permission)
    }

    /// Validates capability configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.overrides.len() > MAX_CAPABILITY_OVERRIDES {
            return Err(ConfigError::Invalid("too many capabilities.overrides".to_string()));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.overrides {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "capabilities.overrides name must be non-empty".to_string(),
                ));
            }
            if name.len() > MAX_CAPABILITY_NAME_LENGTH {
                return Err(ConfigError::Invalid(
                    "capabilities.overrides name exceeds max length".to_string(),
                ));
            }
            if !seen.insert((entry.kind, entry.name.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate capabilities.overrides entry: {} {}",
                    entry.kind, entry.name
                )));
            }
        }
        Ok(())
    }
}

/// Per-kind confirmation defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionDefaultsConfig {
    /// Whether tools require confirmation by default.
    #[serde(default = "default_tool_requires_permission")]
    pub tool_requires_permission: bool,
    /// Whether resources require confirmation by default.
    #[serde(default)]
    pub resource_requires_permission: bool,
}

impl Default for PermissionDefaultsConfig {
    fn default() -> Self {
        Self {
            tool_requires_permission: default_tool_requires_permission(),
            resource_requires_permission: false,
        }
    }
}

/// Confirmation override for one capability.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityOverride {
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Capability name.
    pub name: String,
    /// Whether confirmation is required.
    pub requires_permission: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default maximum body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Returns the default key environment variable.
fn default_key_env() -> String {
    DEFAULT_KEY_ENV.to_string()
}

/// Returns the default key cache TTL.
const fn default_key_cache_ttl_seconds() -> u64 {
    DEFAULT_KEY_CACHE_TTL_SECONDS
}

/// Returns the default key fetch timeout.
const fn default_key_fetch_timeout_ms() -> u64 {
    DEFAULT_KEY_FETCH_TIMEOUT_MS
}

/// Returns the default confirmation TTL.
const fn default_confirmation_ttl_seconds() -> u64 {
    DEFAULT_CONFIRMATION_TTL_SECONDS
}

/// Returns the default sweep interval.
const fn default_sweep_interval_seconds() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECONDS
}

/// Returns the default retention window.
const fn default_retention_seconds() -> u64 {
    DEFAULT_RETENTION_SECONDS
}

/// Returns the default store busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// The demo catalog is registered unless disabled.
const fn default_builtin_catalog() -> bool {
    true
}

/// Tools require confirmation unless configured otherwise.
const fn default_tool_requires_permission() -> bool {
    true
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a store path.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_string("confirmation.store.path", &path.to_string_lossy())?;
    if path.is_dir() {
        return Err(ConfigError::Invalid(
            "confirmation.store.path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Validates an environment variable name.
fn validate_env_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PATH_COMPONENT_LENGTH
        && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !name.starts_with(|ch: char| ch.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("auth.key.name is not a valid variable name: {name}")))
    }
}

/// Validates that `value` lies within `[min, max]`.
fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
