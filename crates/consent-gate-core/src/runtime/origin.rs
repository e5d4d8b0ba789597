// crates/consent-gate-core/src/runtime/origin.rs
// ============================================================================
// Module: Consent Gate Origin Filter
// Description: Network origin allowlist enforcement.
// Purpose: Reject callers outside the configured address ranges before auth.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The origin filter is the first gate check. An empty allowlist admits every
//! caller; a populated one admits a caller when any entry contains its
//! address. The filter trusts the address it is given: resolving the real
//! client behind a trusted proxy is the transport's job.
//!
//! Security posture: when the allowlist is populated, a request with no known
//! remote address is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use crate::core::AllowlistEntry;
use crate::core::AllowlistError;

// ============================================================================
// SECTION: Origin Filter
// ============================================================================

/// Allowlist-based origin filter.
#[derive(Debug, Clone, Default)]
pub struct OriginFilter {
    /// Allowed networks (logical OR).
    entries: Vec<AllowlistEntry>,
}

impl OriginFilter {
    /// Builds a filter from parsed entries.
    #[must_use]
    pub const fn new(entries: Vec<AllowlistEntry>) -> Self {
        Self {
            entries,
        }
    }

    /// Builds a filter that admits every caller.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self::new(Vec::new())
    }

    /// Parses entries from strings.
    ///
    /// # Errors
    ///
    /// Returns [`AllowlistError`] for the first invalid entry.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, AllowlistError> {
        let parsed = entries
            .iter()
            .map(|entry| AllowlistEntry::parse(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(parsed))
    }

    /// Returns true when every caller is admitted.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the configured entries.
    #[must_use]
    pub fn entries(&self) -> &[AllowlistEntry] {
        &self.entries
    }

    /// Returns true when the caller address is admitted.
    #[must_use]
    pub fn is_allowed(&self, remote: Option<IpAddr>) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        remote.is_some_and(|addr| self.entries.iter().any(|entry| entry.contains(addr)))
    }
}
