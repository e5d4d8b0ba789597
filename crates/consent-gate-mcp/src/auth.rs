// crates/consent-gate-mcp/src/auth.rs
// ============================================================================
// Module: Bearer Token Authentication
// Description: JWT verification, key sourcing, and bearer header parsing.
// Purpose: Turn an Authorization header into a verified caller identity.
// Dependencies: consent-gate-core, consent-gate-config, jsonwebtoken, reqwest
// ============================================================================

//! ## Overview
//! [`JwtTokenVerifier`] implements [`consent_gate_core::TokenVerifier`] over
//! signed JWTs. The accepted algorithm comes from configuration and is never
//! taken from the token header. Signature checks are delegated to
//! `jsonwebtoken`; time and claim checks run here against the injected
//! [`consent_gate_core::Clock`] so expiry is deterministic under test.
//!
//! Key material is loaded once for inline, environment, and file sources. URL
//! sources are fetched lazily and cached for a fixed TTL; a fetch failure on a
//! cache miss is reported as `KeyUnavailable` and a stale key is never reused.
//!
//! Security posture: tokens are untrusted input and every failure is fail
//! closed; raw tokens are only ever recorded as SHA-256 fingerprints.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use consent_gate_config::AuthConfig;
use consent_gate_config::KeySourceConfig;
use consent_gate_config::TokenAlgorithm;
use consent_gate_core::AuthError;
use consent_gate_core::Clock;
use consent_gate_core::Identity;
use consent_gate_core::Timestamp;
use consent_gate_core::TokenVerifier;
use consent_gate_core::sha256_hex;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted Authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

/// Maximum accepted size for fetched key material.
const MAX_REMOTE_KEY_BYTES: usize = 64 * 1024;

/// Claims mapped onto named [`Identity`] fields.
const REGISTERED_CLAIMS: [&str; 6] = ["sub", "iss", "aud", "exp", "iat", "nbf"];

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context used for auth decisions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Resolved client address when available.
    pub peer_ip: Option<IpAddr>,
    /// Authorization header value.
    pub auth_header: Option<String>,
    /// Optional request identifier for auditing.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Builds an HTTP request context.
    #[must_use]
    pub const fn http(peer_ip: Option<IpAddr>, auth_header: Option<String>) -> Self {
        Self {
            peer_ip,
            auth_header,
            request_id: None,
        }
    }

    /// Returns a copy with the request identifier set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the bearer token when the header carries a usable one.
    #[must_use]
    pub fn bearer_token(&self) -> Option<String> {
        parse_bearer_token(self.auth_header.as_deref()).ok()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] when the header is missing, oversized,
/// or not a bearer credential.
pub fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::MalformedToken("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::MalformedToken("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedToken("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}

// ============================================================================
// SECTION: Key Sources
// ============================================================================

/// Fetches remote verification key material.
pub trait KeyFetcher: Send + Sync {
    /// Returns the raw key bytes served at `url`.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure when the key cannot be fetched.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Blocking HTTP key fetcher.
pub struct HttpKeyFetcher {
    /// Per-request timeout.
    timeout: Duration,
}

impl HttpKeyFetcher {
    /// Creates a fetcher with the given request timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
        }
    }
}

impl KeyFetcher for HttpKeyFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| format!("http client init failed: {err}"))?;
        let response = client
            .get(url)
            .send()
            .map_err(|err| format!("key fetch failed: {err}"))?
            .error_for_status()
            .map_err(|err| format!("key fetch failed: {err}"))?;
        let bytes = response.bytes().map_err(|err| format!("key read failed: {err}"))?;
        if bytes.len() > MAX_REMOTE_KEY_BYTES {
            return Err("key material too large".to_string());
        }
        Ok(bytes.to_vec())
    }
}

/// Verification key material.
pub enum KeySource {
    /// Key loaded once at startup.
    Static(DecodingKey),
    /// Key fetched over HTTP and cached.
    Remote(RemoteKey),
}

impl KeySource {
    /// Builds the key source described by configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyUnavailable`] when static key material is
    /// missing or unparsable.
    pub fn from_config(
        config: &AuthConfig,
        fetcher: Arc<dyn KeyFetcher>,
    ) -> Result<Self, AuthError> {
        let material = match &config.key {
            KeySourceConfig::Inline {
                value,
            } => value.clone().into_bytes(),
            KeySourceConfig::Env {
                name,
            } => std::env::var(name)
                .map_err(|_| {
                    AuthError::KeyUnavailable(format!("environment variable {name} is not set"))
                })?
                .into_bytes(),
            KeySourceConfig::File {
                path,
            } => {
                let mut bytes = std::fs::read(path).map_err(|err| {
                    AuthError::KeyUnavailable(format!("key file {path} unreadable: {err}"))
                })?;
                if config.algorithm.is_symmetric() {
                    while bytes.last().is_some_and(u8::is_ascii_whitespace) {
                        bytes.pop();
                    }
                }
                bytes
            }
            KeySourceConfig::Url {
                url,
            } => {
                return Ok(Self::Remote(RemoteKey::new(
                    url.clone(),
                    config.algorithm,
                    config.key_cache_ttl_seconds,
                    fetcher,
                )));
            }
        };
        Ok(Self::Static(decoding_key(config.algorithm, &material)?))
    }

    /// Returns the key to verify with at `now`.
    fn current(&self, now: Timestamp) -> Result<DecodingKey, AuthError> {
        match self {
            Self::Static(key) => Ok(key.clone()),
            Self::Remote(remote) => remote.current(now),
        }
    }
}

/// Remote key with a TTL cache.
pub struct RemoteKey {
    /// Key URL.
    url: String,
    /// Algorithm the key material is parsed for.
    algorithm: TokenAlgorithm,
    /// Cache lifetime in seconds.
    ttl_seconds: u64,
    /// Key transport.
    fetcher: Arc<dyn KeyFetcher>,
    /// Last successfully fetched key.
    cache: Mutex<Option<CachedKey>>,
}

/// Cached remote key and its fetch time.
struct CachedKey {
    /// Parsed key.
    key: DecodingKey,
    /// Fetch time.
    fetched_at: Timestamp,
}

impl RemoteKey {
    /// Creates an empty-cache remote key.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        algorithm: TokenAlgorithm,
        ttl_seconds: u64,
        fetcher: Arc<dyn KeyFetcher>,
    ) -> Self {
        Self {
            url: url.into(),
            algorithm,
            ttl_seconds,
            fetcher,
            cache: Mutex::new(None),
        }
    }

    /// Returns the cached key, refreshing it when the TTL has elapsed.
    fn current(&self, now: Timestamp) -> Result<DecodingKey, AuthError> {
        {
            let cache = self
                .cache
                .lock()
                .map_err(|_| AuthError::KeyUnavailable("key cache lock poisoned".to_string()))?;
            if let Some(cached) = cache.as_ref()
                && now < cached.fetched_at.plus_seconds(self.ttl_seconds)
            {
                return Ok(cached.key.clone());
            }
        }
        // Fetch outside the lock; concurrent misses may fetch twice.
        let fetched = self.fetcher.fetch(&self.url).map_err(AuthError::KeyUnavailable);
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| AuthError::KeyUnavailable("key cache lock poisoned".to_string()))?;
        let key = match fetched.and_then(|bytes| decoding_key(self.algorithm, &bytes)) {
            Ok(key) => key,
            Err(err) => {
                *cache = None;
                return Err(err);
            }
        };
        *cache = Some(CachedKey {
            key: key.clone(),
            fetched_at: now,
        });
        Ok(key)
    }
}

/// Parses key material for the configured algorithm.
fn decoding_key(algorithm: TokenAlgorithm, material: &[u8]) -> Result<DecodingKey, AuthError> {
    if material.is_empty() {
        return Err(AuthError::KeyUnavailable("key material is empty".to_string()));
    }
    match algorithm {
        TokenAlgorithm::Hs256 | TokenAlgorithm::Hs384 | TokenAlgorithm::Hs512 => {
            Ok(DecodingKey::from_secret(material))
        }
        TokenAlgorithm::Rs256 => DecodingKey::from_rsa_pem(material)
            .map_err(|err| AuthError::KeyUnavailable(format!("invalid rsa public key: {err}"))),
        TokenAlgorithm::Es256 => DecodingKey::from_ec_pem(material)
            .map_err(|err| AuthError::KeyUnavailable(format!("invalid ec public key: {err}"))),
    }
}

/// Maps the configured algorithm onto the JWT library algorithm.
const fn jwt_algorithm(algorithm: TokenAlgorithm) -> Algorithm {
    match algorithm {
        TokenAlgorithm::Hs256 => Algorithm::HS256,
        TokenAlgorithm::Hs384 => Algorithm::HS384,
        TokenAlgorithm::Hs512 => Algorithm::HS512,
        TokenAlgorithm::Rs256 => Algorithm::RS256,
        TokenAlgorithm::Es256 => Algorithm::ES256,
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// JWT bearer token verifier.
pub struct JwtTokenVerifier {
    /// Accepted signing algorithm.
    algorithm: Algorithm,
    /// Signature-only validation settings.
    validation: Validation,
    /// Verification key material.
    keys: KeySource,
    /// Required issuer.
    issuer: Option<String>,
    /// Required audience entry.
    audience: Option<String>,
    /// Allowed clock skew in seconds.
    clock_skew_seconds: u64,
    /// Time source.
    clock: Arc<dyn Clock>,
}

impl JwtTokenVerifier {
    /// Builds a verifier from configuration, fetching URL keys over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyUnavailable`] when static key material cannot
    /// be loaded.
    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        let fetcher = Arc::new(HttpKeyFetcher::new(Duration::from_millis(
            config.key_fetch_timeout_ms,
        )));
        let keys = KeySource::from_config(config, fetcher)?;
        Ok(Self::with_keys(config, keys, clock))
    }

    /// Builds a verifier with explicit key material.
    #[must_use]
    pub fn with_keys(config: &AuthConfig, keys: KeySource, clock: Arc<dyn Clock>) -> Self {
        let algorithm = jwt_algorithm(config.algorithm);
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        Self {
            algorithm,
            validation,
            keys,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            clock_skew_seconds: config.clock_skew_seconds,
            clock,
        }
    }

    /// Checks `iss` and `aud` against the configured expectations.
    fn check_claims(&self, issuer: Option<&str>, audience: &[String]) -> Result<(), AuthError> {
        if let Some(expected) = &self.issuer
            && issuer != Some(expected.as_str())
        {
            return Err(AuthError::ClaimMismatch("issuer mismatch".to_string()));
        }
        if let Some(expected) = &self.audience
            && !audience.iter().any(|entry| entry == expected)
        {
            return Err(AuthError::ClaimMismatch("audience mismatch".to_string()));
        }
        Ok(())
    }

    /// Checks `exp`, `iat`, and `nbf` against the clock with skew.
    fn check_times(
        &self,
        expires_at: Option<Timestamp>,
        issued_at: Option<Timestamp>,
        not_before: Option<Timestamp>,
    ) -> Result<(), AuthError> {
        let now = self.clock.now();
        if let Some(exp) = expires_at
            && now > exp.plus_seconds(self.clock_skew_seconds)
        {
            return Err(AuthError::Expired);
        }
        for start in [issued_at, not_before].into_iter().flatten() {
            if now < start.minus_seconds(self.clock_skew_seconds) {
                return Err(AuthError::NotYetValid);
            }
        }
        Ok(())
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, raw_token: &str) -> Result<Identity, AuthError> {
        if raw_token.len() > MAX_AUTH_HEADER_BYTES {
            return Err(AuthError::MalformedToken("token too large".to_string()));
        }
        let header = jsonwebtoken::decode_header(raw_token)
            .map_err(|err| AuthError::MalformedToken(err.to_string()))?;
        if header.alg != self.algorithm {
            return Err(AuthError::MalformedToken("unexpected token algorithm".to_string()));
        }
        let key = self.keys.current(self.clock.now())?;
        let data = jsonwebtoken::decode::<Map<String, Value>>(raw_token, &key, &self.validation)
            .map_err(map_jwt_error)?;
        let mut claims = data.claims;

        // Validity window first: a signed but lapsed token reports `Expired`
        // whatever else is wrong with its claims.
        let expires_at = time_claim(&claims, "exp")?;
        let issued_at = time_claim(&claims, "iat")?;
        let not_before = time_claim(&claims, "nbf")?;
        self.check_times(expires_at, issued_at, not_before)?;

        let subject = match claims.get("sub") {
            Some(Value::String(subject)) if !subject.is_empty() => subject.clone(),
            _ => return Err(AuthError::MalformedToken("missing sub claim".to_string())),
        };
        let issuer = match claims.get("iss") {
            None => None,
            Some(Value::String(issuer)) => Some(issuer.clone()),
            Some(_) => return Err(AuthError::MalformedToken("iss must be a string".to_string())),
        };
        let audience = audience_claim(claims.get("aud"))?;
        self.check_claims(issuer.as_deref(), &audience)?;

        for name in REGISTERED_CLAIMS {
            claims.remove(name);
        }
        Ok(Identity {
            subject,
            issuer,
            audience,
            expires_at,
            issued_at,
            not_before,
            claims: claims.into_iter().collect::<BTreeMap<_, _>>(),
            token_fingerprint: sha256_hex(raw_token.as_bytes()),
        })
    }
}

/// Maps library failures onto the stable auth taxonomy.
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey => {
            AuthError::KeyUnavailable(err.to_string())
        }
        _ => AuthError::MalformedToken(err.to_string()),
    }
}

/// Normalizes `aud` (string or array of strings) to a list.
fn audience_claim(value: Option<&Value>) -> Result<Vec<String>, AuthError> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::String(entry)) => Ok(vec![entry.clone()]),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| {
                entry.as_str().map(str::to_string).ok_or_else(|| {
                    AuthError::MalformedToken("aud entries must be strings".to_string())
                })
            })
            .collect(),
        Some(_) => Err(AuthError::MalformedToken("aud must be a string or array".to_string())),
    }
}

/// Reads a NumericDate claim (integer seconds since the epoch).
fn time_claim(claims: &Map<String, Value>, name: &str) -> Result<Option<Timestamp>, AuthError> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(|seconds| Some(Timestamp::from_unix_seconds(seconds)))
            .ok_or_else(|| AuthError::MalformedToken(format!("{name} must be an integer"))),
    }
}

// ============================================================================
// SECTION: Token Issuance
// ============================================================================

/// Claims minted by [`issue_token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    /// Subject.
    pub sub: String,
    /// Issue time (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl TokenClaims {
    /// Builds claims valid from `issued_at` for `ttl_seconds`.
    #[must_use]
    pub fn new(subject: impl Into<String>, issued_at: Timestamp, ttl_seconds: u64) -> Self {
        Self {
            sub: subject.into(),
            iat: issued_at.as_unix_seconds(),
            exp: issued_at.plus_seconds(ttl_seconds).as_unix_seconds(),
            iss: None,
            aud: None,
        }
    }
}

/// Mints a token signed with a shared secret.
///
/// # Errors
///
/// Returns [`AuthError::KeyUnavailable`] for an empty secret or a non-HMAC
/// algorithm, and [`AuthError::MalformedToken`] when encoding fails.
pub fn issue_token(
    algorithm: TokenAlgorithm,
    secret: &[u8],
    claims: &TokenClaims,
) -> Result<String, AuthError> {
    if !algorithm.is_symmetric() {
        return Err(AuthError::KeyUnavailable(format!(
            "token issuance requires an hmac algorithm, not {}",
            algorithm.label()
        )));
    }
    if secret.is_empty() {
        return Err(AuthError::KeyUnavailable("signing secret is empty".to_string()));
    }
    jsonwebtoken::encode(
        &Header::new(jwt_algorithm(algorithm)),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|err| AuthError::MalformedToken(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
